//! Static keyword and regex tables
//!
//! Everything the walker and extractor match against lives here, compiled once
//! on first use. Order matters in several tables: role keywords are evaluated
//! in `FixtureRole` declaration order and timing metrics are tried top to
//! bottom with the first match winning.

use crate::core::models::{FaultType, FixtureRole, MetricType, ToolType};
use lazy_static::lazy_static;
use regex::Regex;

/// Keywords per fixture role, in tie-break order
pub const ROLE_KEYWORDS: &[(FixtureRole, &[&str])] = &[
    (
        FixtureRole::EdgeNode,
        &["edge", "cdn", "proxy", "varnish", "nginx", "haproxy", "envoy"],
    ),
    (
        FixtureRole::Origin,
        &["origin", "backend", "upstream", "server", "source"],
    ),
    (
        FixtureRole::Cache,
        &["cache", "redis", "memcached", "caching"],
    ),
    (
        FixtureRole::LoadBalancer,
        &["lb", "load_balancer", "loadbalancer", "balancer", "haproxy"],
    ),
    (
        FixtureRole::Database,
        &["db", "database", "postgres", "mysql", "mongo", "sql"],
    ),
    (
        FixtureRole::Client,
        &["client", "http_client", "session", "requester", "browser"],
    ),
    (
        FixtureRole::Purge,
        &["purge", "invalidate", "invalidation", "clear", "flush"],
    ),
    (
        FixtureRole::MockServer,
        &["mock", "fake", "stub", "httpserver", "wiremock", "responses"],
    ),
    (
        FixtureRole::Config,
        &["config", "settings", "configuration", "options", "params"],
    ),
    (
        FixtureRole::Metrics,
        &["metrics", "prometheus", "statsd", "collector", "gauge", "counter"],
    ),
    (
        FixtureRole::Tracer,
        &["tracer", "tracing", "span", "jaeger", "zipkin", "opentelemetry"],
    ),
    (
        FixtureRole::Injector,
        &["inject", "fault", "chaos", "failure", "error_injector"],
    ),
];

// Assert classification vocabularies, matched against lowercased source

pub const STATUS_VOCABULARY: &[&str] = &[
    "status_code",
    "status",
    ".status",
    "== 200",
    "== 201",
    "== 204",
    "== 304",
    "== 400",
    "== 404",
    "== 500",
];

pub const HEADER_VOCABULARY: &[&str] = &[
    "header",
    "content-type",
    "cache-control",
    "vary",
    "etag",
    "x-cache",
];

pub const CACHE_VOCABULARY: &[&str] = &["cache", "hit", "miss", "stale", "cached"];

pub const TIMING_VOCABULARY: &[&str] = &[
    "latency",
    "duration",
    "elapsed",
    "time",
    "p50",
    "p90",
    "p95",
    "p99",
    "percentile",
    "timeout",
];

/// Callee substrings that mark an HTTP request whose first argument is a URL
pub const HTTP_VERB_CALLS: &[&str] = &[".get", ".post", ".put", ".delete", ".patch", ".head"];

/// Callee substring → HTTP library signal
pub const HTTP_LIBRARIES: &[(&[&str], &str)] = &[
    (&["requests."], "requests"),
    (&["httpx.", "client."], "httpx"),
    (&["aiohttp"], "aiohttp"),
];

fn case_insensitive(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
        .collect()
}

fn case_sensitive(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

lazy_static! {
    /// Observability tool families and their alternative patterns
    pub static ref OBSERVABILITY_PATTERNS: Vec<(ToolType, Vec<Regex>)> = vec![
        (ToolType::Tcpdump, case_insensitive(&[r"tcpdump", r"packet\s*capture", r"pcap"])),
        (ToolType::Dtrace, case_insensitive(&[r"dtrace", r"dtruss", r"\.d\s+script"])),
        (ToolType::Ebpf, case_insensitive(&[r"ebpf", r"bpf", r"bpftrace", r"bcc"])),
        (ToolType::Wireshark, case_insensitive(&[r"wireshark", r"tshark", r"\.pcap"])),
        (ToolType::Prometheus, case_insensitive(&[r"prometheus", r"prom_client", r"push_gateway"])),
        (ToolType::Grafana, case_insensitive(&[r"grafana", r"dashboard"])),
        (ToolType::Jaeger, case_insensitive(&[r"jaeger", r"opentracing"])),
        (ToolType::OpenTelemetry, case_insensitive(&[r"opentelemetry", r"otel", r"otlp"])),
        (ToolType::Strace, case_insensitive(&[r"strace", r"ltrace"])),
        (ToolType::Perf, case_insensitive(&[r"perf\s+record", r"perf\s+stat", r"linux\s+perf"])),
        (ToolType::Logs, case_insensitive(&[r"logging", r"logger", r"log_capture", r"caplog"])),
    ];

    /// Fault types and their alternative patterns.
    /// Short tokens are word-bounded so `first`, `video` and `room` stay quiet.
    pub static ref FAULT_PATTERNS: Vec<(FaultType, Vec<Regex>)> = vec![
        (FaultType::Timeout, case_insensitive(&[r"timeout", r"read_timeout", r"connect_timeout", r"deadline"])),
        (FaultType::ConnectionDrop, case_insensitive(&[r"connection\s*reset", r"conn.*drop", r"\brst\b", r"econnreset"])),
        (FaultType::ConnectionRefuse, case_insensitive(&[r"connection\s*refused", r"econnrefused", r"conn.*refuse"])),
        (FaultType::Dns, case_insensitive(&[r"dns.*fail", r"resolve.*fail", r"nxdomain", r"dns.*error"])),
        (FaultType::Disk, case_insensitive(&[r"disk.*fail", r"io.*error", r"\beio\b", r"enospc", r"readonly.*fs"])),
        (FaultType::Latency, case_insensitive(&[r"inject.*latency", r"add.*delay", r"slow.*down", r"throttle"])),
        (FaultType::PacketLoss, case_insensitive(&[r"packet.*loss", r"drop.*packet", r"network.*partition"])),
        (FaultType::Cpu, case_insensitive(&[r"cpu.*stress", r"cpu.*load", r"cpu.*exhaust"])),
        (FaultType::Memory, case_insensitive(&[r"memory.*exhaust", r"\boom\b", r"out.*of.*memory", r"mem.*pressure"])),
        (FaultType::Chaos, case_insensitive(&[r"chaos", r"litmus", r"chaos.*mesh", r"chaos.*monkey"])),
    ];

    /// URL, loopback host and well-known path shapes
    pub static ref URL_PATTERNS: Vec<Regex> = case_sensitive(&[
        r#"https?://[^\s"'\)]+"#,
        r"localhost:\d+",
        r"127\.0\.0\.1:\d+",
        r"0\.0\.0\.0:\d+",
        r"/api/v\d+/\w+",
        r"/health",
        r"/metrics",
        r"/ready",
        r"/live",
    ]);

    /// Port-like numbers; group 1 is the port
    pub static ref PORT_PATTERNS: Vec<Regex> = case_sensitive(&[
        r"port\s*[=:]\s*(\d+)",
        r":\s*(\d{2,5})\b",
        r"PORT\s*[=:]\s*(\d+)",
    ]);

    /// `host:port` form of an endpoint value
    pub static ref HOST_PORT: Regex = Regex::new(r"^[A-Za-z0-9.\-]+:\d{1,5}$").unwrap();

    /// Timing metrics in priority order, matched against lowercased assert source
    pub static ref TIMING_METRICS: Vec<(MetricType, Regex)> = vec![
        (MetricType::P50, Regex::new(r"p50|percentile.*50|50th").unwrap()),
        (MetricType::P90, Regex::new(r"p90|percentile.*90|90th").unwrap()),
        (MetricType::P95, Regex::new(r"p95|percentile.*95|95th").unwrap()),
        (MetricType::P99, Regex::new(r"p99|percentile.*99|99th").unwrap()),
        (MetricType::Latency, Regex::new(r"latency|response.*time").unwrap()),
        (MetricType::Duration, Regex::new(r"duration|elapsed").unwrap()),
        (MetricType::Timeout, Regex::new(r"timeout").unwrap()),
        (MetricType::Throughput, Regex::new(r"throughput|rps|qps|requests.*per.*second").unwrap()),
    ];

    /// Comparison operator followed by a number and an optional unit
    pub static ref TIMING_THRESHOLD: Regex = Regex::new(
        r"[<>=]+\s*(\d+(?:\.\d+)?)\s*(ms|s|seconds?|milliseconds?)?"
    ).unwrap();

    pub static ref RETRY: Regex = Regex::new(r"(?i)retry|retries|attempt").unwrap();

    // Template normalization
    pub static ref INTEGER_LITERAL: Regex = Regex::new(r"\b\d+\b").unwrap();
    pub static ref DOUBLE_QUOTED: Regex = Regex::new(r#""[^"]*""#).unwrap();
    pub static ref SINGLE_QUOTED: Regex = Regex::new(r"'[^']*'").unwrap();

    // Expected values per template category
    pub static ref STATUS_VALUE: Regex = Regex::new(r"\b([1-5]\d{2})\b").unwrap();
    pub static ref HEADER_VALUE: Regex = Regex::new(r#"["']([A-Z][A-Za-z]*(?:-[A-Za-z]+)*)["']"#).unwrap();
    pub static ref CACHE_VALUE: Regex = Regex::new(r"(?i)\b(hit|miss|stale|expired|fresh)\b").unwrap();

    // String literal signal categories, checked in this order
    pub static ref ENDPOINT_SIGNAL: Regex = Regex::new(r"https?://").unwrap();
    pub static ref ERROR_SIGNAL: Regex = Regex::new(r"error|fail|exception").unwrap();
    pub static ref CACHE_SIGNAL: Regex = Regex::new(r"cache|hit|miss").unwrap();
    pub static ref HEADER_SIGNAL: Regex = Regex::new(r"header|content-type").unwrap();

    /// `scope="..."` keyword inside a fixture decorator
    pub static ref FIXTURE_SCOPE: Regex = Regex::new(r#"scope\s*=\s*["'](\w+)["']"#).unwrap();
}

/// Keywords owned by one role; empty for `Unknown`
pub fn role_keywords(role: FixtureRole) -> &'static [&'static str] {
    ROLE_KEYWORDS
        .iter()
        .find(|(r, _)| *r == role)
        .map(|(_, kws)| *kws)
        .unwrap_or(&[])
}

/// True when any vocabulary entry occurs in `lowered`
pub fn contains_any(lowered: &str, vocabulary: &[&str]) -> bool {
    vocabulary.iter().any(|kw| lowered.contains(kw))
}
