//! Pattern extraction
//!
//! Folds per-file inventories into one [`LearnedPatterns`] aggregate. The
//! extractor is a pure function of its inputs and the static tables in
//! [`crate::core::tables`]: files can be analyzed independently and fed in
//! one at a time, and rules are derived once at the end.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use crate::core::models::{
    push_capped_example, union_into, AssertionKind, AssertionTemplate, EndpointKey, EndpointKind,
    EndpointPattern, ExtractedFixture, FaultInjectionPattern, FaultType, FixtureRole,
    LearnedPatterns, ObservabilityPattern, RiskRule, Signal, SignalCategory, SignalKey,
    TemplateKey, TimingAssertion, PACK_FAULT_INJECTION, PACK_HTTP_CACHE,
    PACK_LATENCY_OBSERVABILITY,
};
use crate::core::syntax::{AssertInfo, CallInfo, FunctionInfo, ParsedTestFile, StringLiteral};
use crate::core::tables::{
    CACHE_SIGNAL, CACHE_VALUE, DOUBLE_QUOTED, ENDPOINT_SIGNAL, ERROR_SIGNAL, FAULT_PATTERNS,
    HEADER_SIGNAL, HEADER_VALUE, HOST_PORT, HTTP_LIBRARIES, HTTP_VERB_CALLS, INTEGER_LITERAL,
    OBSERVABILITY_PATTERNS, PORT_PATTERNS, RETRY, ROLE_KEYWORDS, SINGLE_QUOTED, STATUS_VALUE,
    TIMING_METRICS, TIMING_THRESHOLD, URL_PATTERNS,
};
use crate::core::walker::normalize_path_separators;

// Role scoring weights
const NAME_WEIGHT: f64 = 0.5;
const DOCSTRING_WEIGHT: f64 = 0.3;
const BODY_WEIGHT: f64 = 0.2;
const MIN_ROLE_SCORE: f64 = 0.3;

/// Minimum confidence for a fixture to count as edge infrastructure
const EDGE_FIXTURE_CONFIDENCE: f64 = 0.5;

/// The HTTP rule fires only when distinct status-code templates exceed this count
const STATUS_TEMPLATE_THRESHOLD: usize = 3;

const SIGNAL_CONTEXT_CHARS: usize = 100;
const TIMING_CONTEXT_CHARS: usize = 100;
const OBSERVABILITY_CONTEXT_CHARS: usize = 200;

/// Outcome of fixture role inference
#[derive(Debug, Clone, PartialEq)]
pub struct RoleInference {
    pub role: FixtureRole,
    pub confidence: f64,
    pub indicators: Vec<String>,
}

/// Infer a fixture's role from its name, docstring and body.
///
/// Each role sums keyword hits (name 0.5, docstring 0.3, body 0.2). Roles are
/// evaluated in declaration order and a later role wins only with a strictly
/// higher raw score.
pub fn infer_fixture_role(name: &str, docstring: &str, body: &str) -> RoleInference {
    let name_lower = name.to_lowercase();
    let doc_lower = docstring.to_lowercase();
    let body_lower = body.to_lowercase();

    let mut best = RoleInference {
        role: FixtureRole::Unknown,
        confidence: 0.0,
        indicators: Vec::new(),
    };
    let mut best_score = 0.0;

    for (role, keywords) in ROLE_KEYWORDS {
        let mut score = 0.0;
        let mut indicators = Vec::new();

        for kw in *keywords {
            if name_lower.contains(kw) {
                score += NAME_WEIGHT;
                indicators.push(format!("name contains '{}'", kw));
            }
            if doc_lower.contains(kw) {
                score += DOCSTRING_WEIGHT;
                indicators.push(format!("docstring contains '{}'", kw));
            }
            if body_lower.contains(kw) {
                score += BODY_WEIGHT;
                indicators.push(format!("body contains '{}'", kw));
            }
        }

        if score > best_score {
            best_score = score;
            best = RoleInference {
                role: *role,
                confidence: f64::min(score, 1.0),
                indicators,
            };
        }
    }

    if best.confidence >= MIN_ROLE_SCORE {
        return best;
    }

    if name_lower.contains("request") || name_lower.contains("http") {
        return RoleInference {
            role: FixtureRole::Client,
            confidence: 0.4,
            indicators: vec!["name suggests HTTP client".to_string()],
        };
    }
    if name_lower.contains("setup") || name_lower.contains("teardown") {
        return RoleInference {
            role: FixtureRole::Config,
            confidence: 0.3,
            indicators: vec!["name suggests setup/config".to_string()],
        };
    }

    RoleInference {
        role: FixtureRole::Unknown,
        confidence: 0.0,
        indicators: Vec::new(),
    }
}

/// Replace integer and quoted string literals with placeholders
pub fn normalize_assertion(source: &str) -> String {
    let template = INTEGER_LITERAL.replace_all(source, "{number}");
    let template = DOUBLE_QUOTED.replace_all(&template, "\"{string}\"");
    let template = SINGLE_QUOTED.replace_all(&template, "'{string}'");
    template.trim().to_string()
}

/// Values an assertion of the given kind expects, sorted and unique
pub fn expected_values(kind: AssertionKind, source: &str) -> Vec<String> {
    let values: BTreeSet<String> = match kind {
        AssertionKind::StatusCode => STATUS_VALUE
            .captures_iter(source)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect(),
        AssertionKind::Header => HEADER_VALUE
            .captures_iter(source)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .filter(|h| h.len() > 2)
            .collect(),
        AssertionKind::Cache => CACHE_VALUE
            .captures_iter(source)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_lowercase()))
            .collect(),
        _ => BTreeSet::new(),
    };
    values.into_iter().collect()
}

/// Parse a timing-flagged assertion.
///
/// Returns `None` when no metric keyword matches.
pub fn parse_timing_assertion(source: &str) -> Option<TimingAssertion> {
    let lowered = source.to_lowercase();
    let (metric_type, _) = TIMING_METRICS.iter().find(|(_, re)| re.is_match(&lowered))?;

    let mut threshold_value = None;
    let mut threshold_unit = "ms".to_string();
    if let Some(caps) = TIMING_THRESHOLD.captures(source) {
        threshold_value = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
        if let Some(unit) = caps.get(2) {
            threshold_unit = if unit.as_str().starts_with('s') {
                "s".to_string()
            } else {
                "ms".to_string()
            };
        }
    }

    let comparison = [">=", ">", "<=", "<"]
        .iter()
        .find(|op| source.contains(*op))
        .copied()
        .unwrap_or("<");

    Some(TimingAssertion {
        metric_type: *metric_type,
        comparison: comparison.to_string(),
        threshold_value,
        threshold_unit,
        context: truncate_chars(source, TIMING_CONTEXT_CHARS),
        occurrences: 1,
        examples: vec![source.to_string()],
    })
}

/// Strip whitespace and quotes from an endpoint candidate
fn clean_endpoint(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '\'' || c == '"')
}

/// Shape of a url-like endpoint value
pub fn classify_endpoint(value: &str) -> EndpointKind {
    if value.starts_with('/') {
        EndpointKind::Path
    } else if HOST_PORT.is_match(value) {
        EndpointKind::Host
    } else {
        EndpointKind::Url
    }
}

/// Whether a call argument is a plain or formatted string literal
fn is_string_argument(arg: &str) -> bool {
    let prefix_len = arg
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .count();
    prefix_len <= 2 && matches!(arg[prefix_len..].chars().next(), Some('"') | Some('\''))
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Insertion-ordered map used for every de-duplicated collection
struct Keyed<K, T> {
    items: Vec<T>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash, T> Keyed<K, T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn upsert(&mut self, key: K, insert: impl FnOnce() -> T, update: impl FnOnce(&mut T)) {
        match self.index.get(&key) {
            Some(&pos) => update(&mut self.items[pos]),
            None => {
                self.index.insert(key, self.items.len());
                self.items.push(insert());
            }
        }
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn into_vec(self) -> Vec<T> {
        self.items
    }
}

/// Accumulates patterns across files
pub struct PatternExtractor {
    signals: Keyed<SignalKey, Signal>,
    fixtures: Keyed<String, ExtractedFixture>,
    templates: Keyed<TemplateKey, AssertionTemplate>,
    timing_assertions: Vec<TimingAssertion>,
    observability_patterns: Vec<ObservabilityPattern>,
    faults: Keyed<FaultType, FaultInjectionPattern>,
    endpoints: Keyed<EndpointKey, EndpointPattern>,
    files_analyzed: Vec<String>,
    total_test_functions: usize,
    total_test_classes: usize,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self {
            signals: Keyed::new(),
            fixtures: Keyed::new(),
            templates: Keyed::new(),
            timing_assertions: Vec::new(),
            observability_patterns: Vec::new(),
            faults: Keyed::new(),
            endpoints: Keyed::new(),
            files_analyzed: Vec::new(),
            total_test_functions: 0,
            total_test_classes: 0,
        }
    }

    /// Extract from a whole corpus at once
    pub fn extract_from_files(mut self, files: &[ParsedTestFile]) -> LearnedPatterns {
        for parsed in files {
            self.add_file(parsed);
        }
        self.finish()
    }

    /// Fold one file into the aggregate
    pub fn add_file(&mut self, parsed: &ParsedTestFile) {
        let file = normalize_path_separators(&parsed.path);
        tracing::debug!(
            file = %file,
            functions = parsed.functions.len(),
            asserts = parsed.asserts.len(),
            "extracting"
        );

        union_into(&mut self.files_analyzed, vec![file.clone()]);
        self.total_test_functions += parsed.test_functions().len();
        self.total_test_classes += parsed.test_classes().len();

        for func in parsed.fixture_functions() {
            self.add_fixture(func, &file);
        }
        // Shared-fixture modules contribute every definition, decorated or not
        if parsed.is_fixture_config() {
            for func in &parsed.functions {
                self.add_fixture(func, &file);
            }
        }

        for assert_info in &parsed.asserts {
            self.add_assertion(assert_info);
        }
        for literal in &parsed.string_literals {
            self.add_string_literal(literal, &file);
        }
        for call in &parsed.calls {
            self.add_call(call, &file);
        }
        for fixture_name in &parsed.fixtures_used {
            self.add_signal(fixture_name, SignalCategory::FixtureReference, &file, "");
        }

        self.scan_observability(&parsed.source, &file);
        self.scan_faults(&parsed.source, &file);
        self.scan_endpoints(&parsed.source, &file);
    }

    fn add_fixture(&mut self, func: &FunctionInfo, file: &str) {
        let docstring = func.docstring.clone().unwrap_or_default();
        let inference = infer_fixture_role(&func.name, &docstring, &func.body_source);

        self.fixtures.upsert(
            func.name.clone(),
            || ExtractedFixture {
                name: func.name.clone(),
                inferred_role: inference.role,
                confidence: inference.confidence,
                scope: func.fixture_scope.clone(),
                usages: 1,
                source_file: file.to_string(),
                parameters: func.args.clone(),
                docstring: docstring.clone(),
                role_indicators: inference.indicators.clone(),
            },
            |existing| {
                existing.absorb(
                    1,
                    inference.role,
                    inference.confidence,
                    inference.indicators.clone(),
                )
            },
        );
    }

    fn add_assertion(&mut self, info: &AssertInfo) {
        let source = info.source.as_str();
        let mut fired = false;

        let flagged = [
            (info.is_status_code, AssertionKind::StatusCode),
            (info.is_header_check, AssertionKind::Header),
            (info.is_cache_check, AssertionKind::Cache),
            (info.is_timing_check, AssertionKind::Timing),
        ];
        for (set, kind) in flagged {
            if set {
                self.add_template(kind, source);
                fired = true;
            }
        }

        if info.is_timing_check {
            if let Some(timing) = parse_timing_assertion(source) {
                self.timing_assertions.push(timing);
            }
        }

        if RETRY.is_match(source) {
            self.add_template(AssertionKind::Retry, source);
            fired = true;
        }

        if !fired {
            self.add_template(AssertionKind::General, source);
        }
    }

    fn add_template(&mut self, kind: AssertionKind, source: &str) {
        let template = normalize_assertion(source);
        let expected = expected_values(kind, source);
        let key = TemplateKey {
            pattern_type: kind,
            template: template.clone(),
        };

        self.templates.upsert(
            key,
            || AssertionTemplate {
                pattern_type: kind,
                template,
                examples: vec![source.to_string()],
                occurrences: 1,
                expected_values: expected.clone(),
            },
            |existing| {
                existing.occurrences += 1;
                existing.push_example(source);
                existing.add_expected_values(expected.clone());
            },
        );
    }

    fn add_string_literal(&mut self, literal: &StringLiteral, file: &str) {
        let value = literal.value.as_str();

        if URL_PATTERNS.iter().any(|re| re.is_match(value)) {
            let cleaned = clean_endpoint(value);
            self.add_endpoint(classify_endpoint(cleaned), cleaned, file);
        }

        let chars = value.chars().count();
        if chars > 3 && chars < 200 {
            let lowered = value.to_lowercase();
            let category = if ENDPOINT_SIGNAL.is_match(value) {
                SignalCategory::Endpoint
            } else if ERROR_SIGNAL.is_match(&lowered) {
                SignalCategory::ErrorMessage
            } else if CACHE_SIGNAL.is_match(&lowered) {
                SignalCategory::Cache
            } else if HEADER_SIGNAL.is_match(&lowered) {
                SignalCategory::Header
            } else {
                SignalCategory::General
            };
            self.add_signal(value, category, file, literal.context.as_str());
        }
    }

    fn add_call(&mut self, call: &CallInfo, file: &str) {
        let func_lower = call.func_name.to_lowercase();

        if HTTP_VERB_CALLS.iter().any(|verb| func_lower.contains(verb)) {
            if let Some(first) = call.args.first().filter(|a| is_string_argument(a)) {
                let cleaned =
                    clean_endpoint(first.trim_start_matches(|c: char| c.is_ascii_alphabetic()));
                self.add_endpoint(classify_endpoint(cleaned), cleaned, file);
            }
        }

        for (needles, library) in HTTP_LIBRARIES {
            if needles.iter().any(|n| func_lower.contains(n)) {
                self.add_signal(library, SignalCategory::Library, file, "");
            }
        }

        for (tool, patterns) in OBSERVABILITY_PATTERNS.iter() {
            if patterns.iter().any(|re| re.is_match(&call.func_name)) {
                self.observability_patterns.push(ObservabilityPattern {
                    tool_type: *tool,
                    pattern: call.source.clone(),
                    source_file: file.to_string(),
                    line_number: call.lineno,
                    context: String::new(),
                });
            }
        }
    }

    /// Every match of every tool pattern is kept, with two lines of context
    fn scan_observability(&mut self, source: &str, file: &str) {
        let lines: Vec<&str> = source.split('\n').collect();

        for (tool, patterns) in OBSERVABILITY_PATTERNS.iter() {
            for re in patterns {
                for m in re.find_iter(source) {
                    let line_number = source[..m.start()].matches('\n').count() + 1;
                    let start = line_number.saturating_sub(2);
                    let end = usize::min(lines.len(), line_number + 2);
                    let context = lines[start..end].join("\n");

                    self.observability_patterns.push(ObservabilityPattern {
                        tool_type: *tool,
                        pattern: m.as_str().to_string(),
                        source_file: file.to_string(),
                        line_number,
                        context: truncate_chars(&context, OBSERVABILITY_CONTEXT_CHARS),
                    });
                }
            }
        }
    }

    /// One hit per fault type per file, aggregated across the corpus
    fn scan_faults(&mut self, source: &str, file: &str) {
        for (fault_type, patterns) in FAULT_PATTERNS.iter() {
            let matched = patterns.iter().find_map(|re| re.find(source));
            if let Some(m) = matched {
                let example = m.as_str().to_string();
                self.faults.upsert(
                    *fault_type,
                    || FaultInjectionPattern {
                        fault_type: *fault_type,
                        method: "detected_in_source".to_string(),
                        target: String::new(),
                        examples: vec![example.clone()],
                        source_files: vec![file.to_string()],
                        occurrences: 1,
                    },
                    |existing| {
                        existing.occurrences += 1;
                        union_into(&mut existing.source_files, vec![file.to_string()]);
                        push_capped_example(&mut existing.examples, &example);
                    },
                );
            }
        }
    }

    fn scan_endpoints(&mut self, source: &str, file: &str) {
        for re in URL_PATTERNS.iter() {
            for m in re.find_iter(source) {
                let cleaned = clean_endpoint(m.as_str());
                self.add_endpoint(classify_endpoint(cleaned), cleaned, file);
            }
        }

        for re in PORT_PATTERNS.iter() {
            for caps in re.captures_iter(source) {
                if let Some(port) = caps.get(1) {
                    self.add_endpoint(EndpointKind::Port, port.as_str(), file);
                }
            }
        }
    }

    fn add_endpoint(&mut self, kind: EndpointKind, raw: &str, file: &str) {
        let value = clean_endpoint(raw);
        if value.chars().count() < 2 {
            return;
        }

        let key = EndpointKey {
            pattern_type: kind,
            value: value.to_string(),
        };
        self.endpoints.upsert(
            key,
            || EndpointPattern {
                pattern_type: kind,
                value: value.to_string(),
                occurrences: 1,
                source_files: vec![file.to_string()],
                is_parameterized: value.contains(['{', '$', '%']),
            },
            |existing| {
                existing.occurrences += 1;
                union_into(&mut existing.source_files, vec![file.to_string()]);
            },
        );
    }

    fn add_signal(&mut self, value: &str, category: SignalCategory, file: &str, context: &str) {
        let key = SignalKey {
            category,
            value: value.to_string(),
        };
        self.signals.upsert(
            key,
            || Signal {
                value: value.to_string(),
                category,
                occurrences: 1,
                source_files: vec![file.to_string()],
                context: truncate_chars(context, SIGNAL_CONTEXT_CHARS),
            },
            |existing| {
                existing.occurrences += 1;
                union_into(&mut existing.source_files, vec![file.to_string()]);
            },
        );
    }

    fn derive_risk_rules(&self) -> Vec<RiskRule> {
        let mut rules = Vec::new();

        let cache_signals = self
            .signals
            .values()
            .filter(|s| s.category == SignalCategory::Cache)
            .count();
        let cache_templates = self.count_templates(AssertionKind::Cache);
        if cache_signals > 0 || cache_templates > 0 {
            rules.push(RiskRule {
                rule_id: "cache-testing-detected".to_string(),
                description: "Tests contain cache-related assertions and patterns".to_string(),
                condition: "cache assertions or cache signals present".to_string(),
                recommended_packs: vec![PACK_HTTP_CACHE.to_string()],
                confidence: f64::min(
                    0.3 + cache_signals as f64 * 0.1 + cache_templates as f64 * 0.15,
                    0.95,
                ),
                derived_from: vec![
                    format!("{} cache signals", cache_signals),
                    format!("{} cache assertions", cache_templates),
                ],
            });
        }

        let timing: u32 = self.timing_assertions.iter().map(|t| t.occurrences).sum();
        if timing > 0 {
            rules.push(RiskRule {
                rule_id: "latency-testing-detected".to_string(),
                description: "Tests contain timing/latency assertions".to_string(),
                condition: "timing assertions present".to_string(),
                recommended_packs: vec![PACK_LATENCY_OBSERVABILITY.to_string()],
                confidence: f64::min(0.4 + timing as f64 * 0.1, 0.9),
                derived_from: vec![format!("{} timing assertions", timing)],
            });
        }

        if !self.faults.is_empty() {
            let fault_count: u32 = self.faults.values().map(|f| f.occurrences).sum();
            let fault_types: Vec<&str> = self
                .faults
                .values()
                .take(5)
                .map(|f| f.fault_type.as_str())
                .collect();
            rules.push(RiskRule {
                rule_id: "fault-injection-detected".to_string(),
                description: "Tests contain fault injection patterns".to_string(),
                condition: "fault injection patterns present".to_string(),
                recommended_packs: vec![PACK_FAULT_INJECTION.to_string()],
                confidence: f64::min(0.5 + fault_count as f64 * 0.05, 0.95),
                derived_from: vec![format!("fault types: {}", fault_types.join(", "))],
            });
        }

        let status_templates = self.count_templates(AssertionKind::StatusCode);
        if status_templates > STATUS_TEMPLATE_THRESHOLD {
            rules.push(RiskRule {
                rule_id: "http-api-testing-detected".to_string(),
                description: "Tests contain HTTP status code assertions".to_string(),
                condition: "multiple HTTP status assertions".to_string(),
                recommended_packs: vec![PACK_HTTP_CACHE.to_string()],
                confidence: f64::min(0.3 + status_templates as f64 * 0.05, 0.8),
                derived_from: vec![format!("{} status code assertions", status_templates)],
            });
        }

        if !self.observability_patterns.is_empty() {
            let tools: BTreeSet<_> = self
                .observability_patterns
                .iter()
                .map(|p| p.tool_type)
                .collect();
            let names: Vec<&str> = tools.iter().map(|t| t.as_str()).collect();
            rules.push(RiskRule {
                rule_id: "observability-tools-detected".to_string(),
                description: format!("Tests use observability tools: {}", names.join(", ")),
                condition: "observability tool patterns present".to_string(),
                recommended_packs: vec![PACK_LATENCY_OBSERVABILITY.to_string()],
                confidence: f64::min(0.4 + tools.len() as f64 * 0.1, 0.85),
                derived_from: vec![format!("tools: {}", names.join(", "))],
            });
        }

        let edge_fixtures: Vec<&ExtractedFixture> = self
            .fixtures
            .values()
            .filter(|f| {
                matches!(
                    f.inferred_role,
                    FixtureRole::EdgeNode | FixtureRole::Cache | FixtureRole::LoadBalancer
                ) && f.confidence > EDGE_FIXTURE_CONFIDENCE
            })
            .collect();
        if !edge_fixtures.is_empty() {
            rules.push(RiskRule {
                rule_id: "edge-infrastructure-detected".to_string(),
                description: "Tests use edge/CDN infrastructure fixtures".to_string(),
                condition: "edge-related fixtures present".to_string(),
                recommended_packs: vec![
                    PACK_HTTP_CACHE.to_string(),
                    PACK_LATENCY_OBSERVABILITY.to_string(),
                ],
                confidence: f64::min(0.5 + edge_fixtures.len() as f64 * 0.1, 0.9),
                derived_from: edge_fixtures
                    .iter()
                    .take(5)
                    .map(|f| f.name.clone())
                    .collect(),
            });
        }

        rules
    }

    fn count_templates(&self, kind: AssertionKind) -> usize {
        self.templates
            .values()
            .filter(|t| t.pattern_type == kind)
            .count()
    }

    /// Derive risk rules and produce the aggregate
    pub fn finish(self) -> LearnedPatterns {
        let risk_rules = self.derive_risk_rules();
        LearnedPatterns {
            total_files_analyzed: self.files_analyzed.len(),
            source_paths: self.files_analyzed,
            total_test_functions: self.total_test_functions,
            total_test_classes: self.total_test_classes,
            signals: self.signals.into_vec(),
            fixtures: self.fixtures.into_vec(),
            assertion_templates: self.templates.into_vec(),
            timing_assertions: self.timing_assertions,
            observability_patterns: self.observability_patterns,
            fault_injection_patterns: self.faults.into_vec(),
            endpoints: self.endpoints.into_vec(),
            risk_rules,
            ..LearnedPatterns::new()
        }
    }
}

/// Extract patterns from a list of parsed files
pub fn extract_patterns(files: &[ParsedTestFile]) -> LearnedPatterns {
    PatternExtractor::new().extract_from_files(files)
}
