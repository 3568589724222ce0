//! Learned pattern data model
//!
//! `LearnedPatterns` is the long-lived document produced by the extractor and
//! persisted by the store. Every categorical field is a closed enumeration
//! serialized as its snake_case tag, and every de-duplicated collection has an
//! explicit composite key type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Document format version
pub const FORMAT_VERSION: &str = "1.0";

/// Upper bound on verbatim examples kept per assertion template
pub const MAX_TEMPLATE_EXAMPLES: usize = 10;

/// Knowledge pack for HTTP cache correctness
pub const PACK_HTTP_CACHE: &str = "edge-http-cache-correctness";
/// Knowledge pack for latency regressions and observability
pub const PACK_LATENCY_OBSERVABILITY: &str = "edge-latency-regression-observability";
/// Knowledge pack for I/O fault injection
pub const PACK_FAULT_INJECTION: &str = "fault-injection-io";

macro_rules! tag_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $tag:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $tag)] $variant),+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Serialized tag
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }

            /// Parse a serialized tag
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($tag => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(self.as_str())
            }
        }
    };
}

tag_enum! {
    /// Inferred role of a fixture. Declaration order is the tie-break order
    /// used by role inference.
    pub enum FixtureRole {
        EdgeNode => "edge_node",
        Origin => "origin",
        Cache => "cache",
        LoadBalancer => "load_balancer",
        Database => "database",
        Client => "client",
        Purge => "purge",
        MockServer => "mock_server",
        Config => "config",
        Metrics => "metrics",
        Tracer => "tracer",
        Injector => "injector",
        Unknown => "unknown",
    }
}

tag_enum! {
    /// Coarse category of a signal
    pub enum SignalCategory {
        General => "general",
        Endpoint => "endpoint",
        ErrorMessage => "error_message",
        Cache => "cache",
        Header => "header",
        FixtureReference => "fixture_reference",
        Library => "library",
    }
}

tag_enum! {
    /// Category of an assertion template
    pub enum AssertionKind {
        StatusCode => "status_code",
        Header => "header",
        Cache => "cache",
        Timing => "timing",
        Retry => "retry",
        General => "general",
    }
}

tag_enum! {
    /// Metric measured by a timing assertion, in matching priority order
    pub enum MetricType {
        P50 => "p50",
        P90 => "p90",
        P95 => "p95",
        P99 => "p99",
        Latency => "latency",
        Duration => "duration",
        Timeout => "timeout",
        Throughput => "throughput",
    }
}

tag_enum! {
    /// Observability tool family
    pub enum ToolType {
        Tcpdump => "tcpdump",
        Dtrace => "dtrace",
        Ebpf => "ebpf",
        Wireshark => "wireshark",
        Prometheus => "prometheus",
        Grafana => "grafana",
        Jaeger => "jaeger",
        OpenTelemetry => "opentelemetry",
        Strace => "strace",
        Perf => "perf",
        Logs => "logs",
    }
}

tag_enum! {
    /// Kind of injected fault
    pub enum FaultType {
        Timeout => "timeout",
        ConnectionDrop => "connection_drop",
        ConnectionRefuse => "connection_refuse",
        Dns => "dns",
        Disk => "disk",
        Latency => "latency",
        PacketLoss => "packet_loss",
        Cpu => "cpu",
        Memory => "memory",
        Chaos => "chaos",
    }
}

tag_enum! {
    /// Shape of an endpoint value
    pub enum EndpointKind {
        Url => "url",
        Port => "port",
        Host => "host",
        Path => "path",
    }
}

/// Identity of a signal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalKey {
    pub category: SignalCategory,
    pub value: String,
}

/// Identity of an assertion template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    pub pattern_type: AssertionKind,
    pub template: String,
}

/// Identity of an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub pattern_type: EndpointKind,
    pub value: String,
}

/// A de-duplicated textual observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub value: String,
    pub category: SignalCategory,
    #[serde(default = "one")]
    pub occurrences: u32,
    #[serde(default)]
    pub source_files: Vec<String>,
    /// Example context the signal was first seen in
    #[serde(default)]
    pub context: String,
}

impl Signal {
    pub fn new(value: impl Into<String>, category: SignalCategory) -> Self {
        Self {
            value: value.into(),
            category,
            occurrences: 1,
            source_files: Vec::new(),
            context: String::new(),
        }
    }

    pub fn key(&self) -> SignalKey {
        SignalKey {
            category: self.category,
            value: self.value.clone(),
        }
    }
}

/// A fixture and its inferred role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFixture {
    pub name: String,
    #[serde(default = "unknown_role")]
    pub inferred_role: FixtureRole,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default = "function_scope")]
    pub scope: String,
    #[serde(default = "one")]
    pub usages: u32,
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub docstring: String,
    /// Why the role was inferred
    #[serde(default)]
    pub role_indicators: Vec<String>,
}

impl ExtractedFixture {
    pub fn new(name: impl Into<String>, role: FixtureRole, confidence: f64) -> Self {
        Self {
            name: name.into(),
            inferred_role: role,
            confidence: confidence.clamp(0.0, 1.0),
            scope: function_scope(),
            usages: 1,
            source_file: String::new(),
            parameters: Vec::new(),
            docstring: String::new(),
            role_indicators: Vec::new(),
        }
    }

    /// Fold another observation of the same fixture into this one.
    ///
    /// Usages always accumulate; role, confidence and indicators move only on
    /// a strictly higher confidence.
    pub fn absorb(
        &mut self,
        usages: u32,
        role: FixtureRole,
        confidence: f64,
        indicators: Vec<String>,
    ) {
        self.usages += usages;
        if confidence > self.confidence {
            self.inferred_role = role;
            self.confidence = confidence;
            self.role_indicators = indicators;
        }
    }
}

/// A normalized assertion shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionTemplate {
    pub pattern_type: AssertionKind,
    pub template: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default = "one")]
    pub occurrences: u32,
    #[serde(default)]
    pub expected_values: Vec<String>,
}

impl AssertionTemplate {
    pub fn key(&self) -> TemplateKey {
        TemplateKey {
            pattern_type: self.pattern_type,
            template: self.template.clone(),
        }
    }

    /// Record a verbatim example, ignoring duplicates and respecting the cap
    pub fn push_example(&mut self, example: &str) {
        push_capped_example(&mut self.examples, example);
    }

    /// Union new expected values into the sorted set.
    ///
    /// Loaded documents may carry an unsorted list, so it is normalized first.
    pub fn add_expected_values<I: IntoIterator<Item = String>>(&mut self, values: I) {
        self.expected_values.sort();
        self.expected_values.dedup();
        for value in values {
            if let Err(pos) = self.expected_values.binary_search(&value) {
                self.expected_values.insert(pos, value);
            }
        }
    }
}

/// A timing/performance assertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingAssertion {
    pub metric_type: MetricType,
    #[serde(default = "less_than")]
    pub comparison: String,
    #[serde(default)]
    pub threshold_value: Option<f64>,
    #[serde(default = "millis")]
    pub threshold_unit: String,
    #[serde(default)]
    pub context: String,
    #[serde(default = "one")]
    pub occurrences: u32,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// One usage site of an observability tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityPattern {
    pub tool_type: ToolType,
    pub pattern: String,
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub line_number: usize,
    #[serde(default)]
    pub context: String,
}

/// Corpus-level aggregate for one fault type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultInjectionPattern {
    pub fault_type: FaultType,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub source_files: Vec<String>,
    #[serde(default = "one")]
    pub occurrences: u32,
}

/// An endpoint, host, port or path referenced by tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPattern {
    pub pattern_type: EndpointKind,
    pub value: String,
    #[serde(default = "one")]
    pub occurrences: u32,
    #[serde(default)]
    pub source_files: Vec<String>,
    #[serde(default)]
    pub is_parameterized: bool,
}

impl EndpointPattern {
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            pattern_type: self.pattern_type,
            value: self.value.clone(),
        }
    }
}

/// A derived heuristic mapping observed patterns to knowledge packs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRule {
    pub rule_id: String,
    pub description: String,
    pub condition: String,
    #[serde(default)]
    pub recommended_packs: Vec<String>,
    #[serde(default = "half")]
    pub confidence: f64,
    #[serde(default)]
    pub derived_from: Vec<String>,
}

/// Root document persisted at `knowledge/learned/<knowledge_id>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPatterns {
    #[serde(default = "format_version")]
    pub version: String,
    #[serde(default)]
    pub knowledge_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub source_paths: Vec<String>,
    #[serde(default)]
    pub total_files_analyzed: usize,
    #[serde(default)]
    pub total_test_functions: usize,
    #[serde(default)]
    pub total_test_classes: usize,

    #[serde(default)]
    pub signals: Vec<Signal>,
    #[serde(default)]
    pub fixtures: Vec<ExtractedFixture>,
    #[serde(default)]
    pub assertion_templates: Vec<AssertionTemplate>,
    #[serde(default)]
    pub timing_assertions: Vec<TimingAssertion>,
    #[serde(default)]
    pub observability_patterns: Vec<ObservabilityPattern>,
    #[serde(default)]
    pub fault_injection_patterns: Vec<FaultInjectionPattern>,
    #[serde(default)]
    pub endpoints: Vec<EndpointPattern>,
    #[serde(default)]
    pub risk_rules: Vec<RiskRule>,
}

impl Default for LearnedPatterns {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: format_version(),
            knowledge_id: String::new(),
            created_at: now,
            updated_at: now,
            source_paths: Vec::new(),
            total_files_analyzed: 0,
            total_test_functions: 0,
            total_test_classes: 0,
            signals: Vec::new(),
            fixtures: Vec::new(),
            assertion_templates: Vec::new(),
            timing_assertions: Vec::new(),
            observability_patterns: Vec::new(),
            fault_injection_patterns: Vec::new(),
            endpoints: Vec::new(),
            risk_rules: Vec::new(),
        }
    }
}

impl LearnedPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixtures whose role confidence is at least `min_confidence`
    pub fn high_confidence_fixtures(&self, min_confidence: f64) -> Vec<&ExtractedFixture> {
        self.fixtures
            .iter()
            .filter(|f| f.confidence >= min_confidence)
            .collect()
    }

    /// Signals in one category
    pub fn signals_by_category(&self, category: SignalCategory) -> Vec<&Signal> {
        self.signals
            .iter()
            .filter(|s| s.category == category)
            .collect()
    }

    /// Risk rules whose confidence is at least `min_confidence`
    pub fn applicable_risk_rules(&self, min_confidence: f64) -> Vec<&RiskRule> {
        self.risk_rules
            .iter()
            .filter(|r| r.confidence >= min_confidence)
            .collect()
    }

    /// Total occurrences across all timing assertions
    pub fn timing_occurrences(&self) -> u32 {
        self.timing_assertions.iter().map(|t| t.occurrences).sum()
    }

    /// Fold `new` into `self`.
    ///
    /// Counted collections sum by identity key and union their source files;
    /// confidence-bearing entries (fixtures, risk rules) keep the maximum.
    pub fn merge(mut self, new: LearnedPatterns) -> LearnedPatterns {
        union_into(&mut self.source_paths, new.source_paths);
        self.total_files_analyzed = self.source_paths.len();
        self.total_test_functions += new.total_test_functions;
        self.total_test_classes += new.total_test_classes;

        self.signals = merge_keyed(self.signals, new.signals, Signal::key, |into, from| {
            into.occurrences += from.occurrences;
            union_into(&mut into.source_files, from.source_files);
        });

        self.fixtures = merge_keyed(
            self.fixtures,
            new.fixtures,
            |f| f.name.clone(),
            |into, from| {
                into.absorb(
                    from.usages,
                    from.inferred_role,
                    from.confidence,
                    from.role_indicators,
                )
            },
        );

        self.assertion_templates = merge_keyed(
            self.assertion_templates,
            new.assertion_templates,
            AssertionTemplate::key,
            |into, from| {
                into.occurrences += from.occurrences;
                for example in &from.examples {
                    into.push_example(example);
                }
                into.add_expected_values(from.expected_values);
            },
        );

        // Also collapses duplicates already present in `self`
        self.timing_assertions = merge_keyed(
            Vec::new(),
            self.timing_assertions.into_iter().chain(new.timing_assertions).collect(),
            |t| t.metric_type,
            |into, from| into.occurrences += from.occurrences,
        );

        self.observability_patterns.extend(new.observability_patterns);

        self.fault_injection_patterns = merge_keyed(
            self.fault_injection_patterns,
            new.fault_injection_patterns,
            |f| f.fault_type,
            |into, from| {
                into.occurrences += from.occurrences;
                union_into(&mut into.source_files, from.source_files);
                for example in &from.examples {
                    push_capped_example(&mut into.examples, example);
                }
            },
        );

        self.endpoints = merge_keyed(
            self.endpoints,
            new.endpoints,
            EndpointPattern::key,
            |into, from| {
                into.occurrences += from.occurrences;
                union_into(&mut into.source_files, from.source_files);
            },
        );

        self.risk_rules = merge_keyed(
            self.risk_rules,
            new.risk_rules,
            |r| r.rule_id.clone(),
            |into, from| {
                if from.confidence > into.confidence {
                    *into = from;
                }
            },
        );

        self.updated_at = Utc::now();
        self
    }
}

/// Merge two keyed lists, preserving first-seen order
fn merge_keyed<T, K, F, M>(existing: Vec<T>, new: Vec<T>, key: F, mut combine: M) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
    M: FnMut(&mut T, T),
{
    let mut merged: Vec<T> = Vec::with_capacity(existing.len() + new.len());
    let mut index: HashMap<K, usize> = HashMap::new();

    for item in existing.into_iter().chain(new) {
        let k = key(&item);
        match index.get(&k) {
            Some(&pos) => combine(&mut merged[pos], item),
            None => {
                index.insert(k, merged.len());
                merged.push(item);
            }
        }
    }

    merged
}

/// Append a verbatim example unless it is a duplicate or the list is full
pub(crate) fn push_capped_example(examples: &mut Vec<String>, example: &str) {
    if examples.len() < MAX_TEMPLATE_EXAMPLES && !examples.iter().any(|e| e == example) {
        examples.push(example.to_string());
    }
}

/// Append items not already present, keeping order
pub(crate) fn union_into(target: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

fn one() -> u32 {
    1
}

fn half() -> f64 {
    0.5
}

fn unknown_role() -> FixtureRole {
    FixtureRole::Unknown
}

fn function_scope() -> String {
    "function".to_string()
}

fn less_than() -> String {
    "<".to_string()
}

fn millis() -> String {
    "ms".to_string()
}

fn format_version() -> String {
    FORMAT_VERSION.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(value: &str, category: SignalCategory, occurrences: u32, file: &str) -> Signal {
        Signal {
            occurrences,
            source_files: vec![file.to_string()],
            ..Signal::new(value, category)
        }
    }

    fn rule(id: &str, confidence: f64) -> RiskRule {
        RiskRule {
            rule_id: id.to_string(),
            description: format!("rule {}", id),
            condition: "test".to_string(),
            recommended_packs: vec![PACK_HTTP_CACHE.to_string()],
            confidence,
            derived_from: Vec::new(),
        }
    }

    #[test]
    fn test_enum_tags_round_trip() {
        assert_eq!(FixtureRole::LoadBalancer.as_str(), "load_balancer");
        assert_eq!(FixtureRole::parse("mock_server"), Some(FixtureRole::MockServer));
        assert_eq!(MetricType::P90.to_string(), "p90");
        assert_eq!(FaultType::parse("packet_loss"), Some(FaultType::PacketLoss));
        assert_eq!(ToolType::OpenTelemetry.as_str(), "opentelemetry");
        assert_eq!(AssertionKind::parse("bogus"), None);
    }

    #[test]
    fn test_fixture_role_order_is_tie_break_order() {
        assert_eq!(FixtureRole::ALL.first(), Some(&FixtureRole::EdgeNode));
        assert_eq!(FixtureRole::ALL.last(), Some(&FixtureRole::Unknown));
        assert_eq!(FixtureRole::ALL.len(), 13);
    }

    #[test]
    fn test_enum_serializes_as_tag() {
        let json = serde_json::to_string(&FixtureRole::EdgeNode).unwrap();
        assert_eq!(json, "\"edge_node\"");
        let role: FixtureRole = serde_json::from_str("\"injector\"").unwrap();
        assert_eq!(role, FixtureRole::Injector);
    }

    #[test]
    fn test_high_confidence_fixtures() {
        let patterns = LearnedPatterns {
            fixtures: vec![
                ExtractedFixture::new("a", FixtureRole::Cache, 0.9),
                ExtractedFixture::new("b", FixtureRole::Client, 0.5),
            ],
            ..LearnedPatterns::new()
        };
        let high = patterns.high_confidence_fixtures(0.7);
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].name, "a");
    }

    #[test]
    fn test_signals_by_category() {
        let patterns = LearnedPatterns {
            signals: vec![
                signal("cache", SignalCategory::Cache, 1, "a.py"),
                signal("requests", SignalCategory::Library, 1, "a.py"),
                signal("X-Cache", SignalCategory::Cache, 1, "a.py"),
            ],
            ..LearnedPatterns::new()
        };
        let cache = patterns.signals_by_category(SignalCategory::Cache);
        assert_eq!(cache.len(), 2);
        assert!(cache.iter().all(|s| s.category == SignalCategory::Cache));
    }

    #[test]
    fn test_applicable_risk_rules() {
        let patterns = LearnedPatterns {
            risk_rules: vec![rule("a", 0.8), rule("b", 0.3), rule("c", 0.5)],
            ..LearnedPatterns::new()
        };
        let applicable = patterns.applicable_risk_rules(0.5);
        assert_eq!(applicable.len(), 2);
        assert!(applicable.iter().all(|r| r.confidence >= 0.5));
    }

    #[test]
    fn test_merge_sums_signals_and_keeps_max_fixture_confidence() {
        let existing = LearnedPatterns {
            total_files_analyzed: 5,
            total_test_functions: 10,
            signals: vec![signal("cache", SignalCategory::Cache, 3, "a.py")],
            fixtures: vec![ExtractedFixture {
                usages: 2,
                ..ExtractedFixture::new("fixture_a", FixtureRole::Client, 0.6)
            }],
            ..LearnedPatterns::new()
        };
        let new = LearnedPatterns {
            total_files_analyzed: 3,
            total_test_functions: 5,
            signals: vec![
                signal("cache", SignalCategory::Cache, 2, "b.py"),
                signal("latency", SignalCategory::General, 1, "b.py"),
            ],
            fixtures: vec![ExtractedFixture {
                role_indicators: vec!["name contains 'client'".to_string()],
                ..ExtractedFixture::new("fixture_a", FixtureRole::Client, 0.8)
            }],
            ..LearnedPatterns::new()
        };

        let merged = existing.merge(new);

        assert_eq!(merged.total_test_functions, 15);
        let cache = merged
            .signals
            .iter()
            .find(|s| s.value == "cache")
            .unwrap();
        assert_eq!(cache.occurrences, 5);
        assert_eq!(cache.source_files, vec!["a.py", "b.py"]);
        assert!(merged.signals.iter().any(|s| s.value == "latency"));

        let fixture = &merged.fixtures[0];
        assert_eq!(fixture.confidence, 0.8);
        assert_eq!(fixture.usages, 3);
        assert_eq!(fixture.role_indicators, vec!["name contains 'client'"]);
    }

    #[test]
    fn test_merge_keeps_signals_with_same_value_in_different_categories_apart() {
        let existing = LearnedPatterns {
            signals: vec![signal("cache", SignalCategory::Cache, 1, "a.py")],
            ..LearnedPatterns::new()
        };
        let new = LearnedPatterns {
            signals: vec![signal("cache", SignalCategory::FixtureReference, 1, "a.py")],
            ..LearnedPatterns::new()
        };
        let merged = existing.merge(new);
        assert_eq!(merged.signals.len(), 2);
    }

    #[test]
    fn test_merge_fixture_lower_confidence_does_not_regress() {
        let existing = LearnedPatterns {
            fixtures: vec![ExtractedFixture::new("edge", FixtureRole::EdgeNode, 0.9)],
            ..LearnedPatterns::new()
        };
        let new = LearnedPatterns {
            fixtures: vec![ExtractedFixture::new("edge", FixtureRole::Origin, 0.4)],
            ..LearnedPatterns::new()
        };
        let merged = existing.merge(new);
        assert_eq!(merged.fixtures[0].inferred_role, FixtureRole::EdgeNode);
        assert_eq!(merged.fixtures[0].confidence, 0.9);
        assert_eq!(merged.fixtures[0].usages, 2);
    }

    #[test]
    fn test_merge_template_examples_capped() {
        let template = |examples: Vec<String>| AssertionTemplate {
            pattern_type: AssertionKind::StatusCode,
            template: "assert r.status_code == {number}".to_string(),
            occurrences: examples.len() as u32,
            examples,
            expected_values: Vec::new(),
        };
        let existing = LearnedPatterns {
            assertion_templates: vec![template(
                (0..8).map(|i| format!("assert r.status_code == 20{}", i)).collect(),
            )],
            ..LearnedPatterns::new()
        };
        let new = LearnedPatterns {
            assertion_templates: vec![template(
                (0..8).map(|i| format!("assert r.status_code == 40{}", i)).collect(),
            )],
            ..LearnedPatterns::new()
        };
        let merged = existing.merge(new);
        assert_eq!(merged.assertion_templates.len(), 1);
        assert_eq!(merged.assertion_templates[0].occurrences, 16);
        assert_eq!(merged.assertion_templates[0].examples.len(), MAX_TEMPLATE_EXAMPLES);
    }

    #[test]
    fn test_merge_fault_examples_capped() {
        let fault = |tag: &str| FaultInjectionPattern {
            fault_type: FaultType::Latency,
            method: "detected_in_source".to_string(),
            target: String::new(),
            examples: (0..MAX_TEMPLATE_EXAMPLES)
                .map(|i| format!("add_delay_{}_{}", tag, i))
                .collect(),
            source_files: vec![format!("{}.py", tag)],
            occurrences: 1,
        };
        let doc = |tag: &str| LearnedPatterns {
            fault_injection_patterns: vec![fault(tag)],
            ..LearnedPatterns::new()
        };

        let merged = doc("a").merge(doc("b")).merge(doc("c"));
        assert_eq!(merged.fault_injection_patterns.len(), 1);
        let latency = &merged.fault_injection_patterns[0];
        assert_eq!(latency.occurrences, 3);
        assert_eq!(latency.source_files.len(), 3);
        assert_eq!(latency.examples.len(), MAX_TEMPLATE_EXAMPLES);
        assert!(latency.examples.iter().all(|e| e.starts_with("add_delay_a_")));
    }

    #[test]
    fn test_expected_values_normalize_unsorted_document() {
        let mut template = AssertionTemplate {
            pattern_type: AssertionKind::StatusCode,
            template: "assert r.status_code == {number}".to_string(),
            examples: Vec::new(),
            occurrences: 1,
            expected_values: vec!["404".to_string(), "200".to_string(), "404".to_string()],
        };
        template.add_expected_values(vec!["200".to_string(), "301".to_string()]);
        assert_eq!(template.expected_values, vec!["200", "301", "404"]);
    }

    #[test]
    fn test_merge_risk_rules_keep_higher_confidence() {
        let existing = LearnedPatterns {
            risk_rules: vec![rule("cache-testing-detected", 0.6), rule("other", 0.9)],
            ..LearnedPatterns::new()
        };
        let new = LearnedPatterns {
            risk_rules: vec![rule("cache-testing-detected", 0.75), rule("other", 0.2)],
            ..LearnedPatterns::new()
        };
        let merged = existing.merge(new);
        let by_id: HashMap<_, _> = merged
            .risk_rules
            .iter()
            .map(|r| (r.rule_id.as_str(), r.confidence))
            .collect();
        assert_eq!(by_id["cache-testing-detected"], 0.75);
        assert_eq!(by_id["other"], 0.9);
    }

    #[test]
    fn test_merge_collapses_timing_by_metric() {
        let timing = |metric| TimingAssertion {
            metric_type: metric,
            comparison: "<".to_string(),
            threshold_value: Some(100.0),
            threshold_unit: "ms".to_string(),
            context: String::new(),
            occurrences: 1,
            examples: Vec::new(),
        };
        let existing = LearnedPatterns {
            timing_assertions: vec![timing(MetricType::P99), timing(MetricType::P99)],
            ..LearnedPatterns::new()
        };
        let new = LearnedPatterns {
            timing_assertions: vec![timing(MetricType::P99), timing(MetricType::Timeout)],
            ..LearnedPatterns::new()
        };
        let merged = existing.merge(new);
        assert_eq!(merged.timing_assertions.len(), 2);
        assert_eq!(merged.timing_occurrences(), 4);
        let p99 = merged
            .timing_assertions
            .iter()
            .find(|t| t.metric_type == MetricType::P99)
            .unwrap();
        assert_eq!(p99.occurrences, 3);
    }

    #[test]
    fn test_merge_source_paths_union() {
        let existing = LearnedPatterns {
            source_paths: vec!["a.py".into(), "b.py".into()],
            ..LearnedPatterns::new()
        };
        let new = LearnedPatterns {
            source_paths: vec!["b.py".into(), "c.py".into()],
            ..LearnedPatterns::new()
        };
        let merged = existing.merge(new);
        assert_eq!(merged.source_paths, vec!["a.py", "b.py", "c.py"]);
        assert_eq!(merged.total_files_analyzed, 3);
    }

    #[test]
    fn test_deserialize_minimal_document_uses_defaults() {
        let patterns: LearnedPatterns = serde_json::from_str(
            r#"{"fixtures": [{"name": "edge_server", "inferred_role": "edge_node"}]}"#,
        )
        .unwrap();
        assert_eq!(patterns.version, FORMAT_VERSION);
        assert_eq!(patterns.fixtures[0].usages, 1);
        assert_eq!(patterns.fixtures[0].scope, "function");
        assert_eq!(patterns.fixtures[0].inferred_role, FixtureRole::EdgeNode);
    }

    #[test]
    fn test_add_expected_values_sorted_unique() {
        let mut template = AssertionTemplate {
            pattern_type: AssertionKind::StatusCode,
            template: String::new(),
            examples: Vec::new(),
            occurrences: 1,
            expected_values: Vec::new(),
        };
        template.add_expected_values(vec!["404".to_string(), "200".to_string()]);
        template.add_expected_values(vec!["200".to_string()]);
        assert_eq!(template.expected_values, vec!["200", "404"]);
    }
}
