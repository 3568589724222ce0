//! Recommendation advisor
//!
//! Scores knowledge packs from a learned-patterns document. Evidence comes
//! from three passes (risk rules, fixture roles, assertion templates) feeding
//! one accumulator per pack, with diminishing returns as a pack nears
//! certainty.

use std::collections::{BTreeSet, HashMap};

use crate::core::models::{
    AssertionKind, FixtureRole, LearnedPatterns, PACK_FAULT_INJECTION, PACK_HTTP_CACHE,
    PACK_LATENCY_OBSERVABILITY,
};
use crate::core::store::PatternStore;

/// Accumulated confidence stays strictly below this
pub const MAX_PACK_CONFIDENCE: f64 = 0.99;

/// Share of a fixture's confidence it contributes to a pack
const FIXTURE_BOOST: f64 = 0.2;

/// Fixtures above this confidence are reported by `matching_fixtures`
const MATCHING_FIXTURE_CONFIDENCE: f64 = 0.3;

/// Diminishing-returns accumulation.
///
/// Each piece of evidence adds less as `current` approaches certainty.
pub fn accumulate(current: f64, contribution: f64) -> f64 {
    let next = current + contribution * (1.0 - current * 0.3);
    next.min(MAX_PACK_CONFIDENCE - f64::EPSILON)
}

/// Packs suggested by a fixture role
fn packs_for_role(role: FixtureRole) -> &'static [&'static str] {
    match role {
        FixtureRole::EdgeNode => &[PACK_HTTP_CACHE, PACK_LATENCY_OBSERVABILITY],
        FixtureRole::Cache => &[PACK_HTTP_CACHE],
        FixtureRole::LoadBalancer => &[PACK_LATENCY_OBSERVABILITY],
        FixtureRole::Injector => &[PACK_FAULT_INJECTION],
        _ => &[],
    }
}

/// Packs suggested by an assertion template category
fn packs_for_assertion(kind: AssertionKind) -> &'static [&'static str] {
    match kind {
        AssertionKind::Cache | AssertionKind::Header | AssertionKind::StatusCode => {
            &[PACK_HTTP_CACHE]
        }
        AssertionKind::Timing => &[PACK_LATENCY_OBSERVABILITY],
        _ => &[],
    }
}

/// Fixture roles relevant to a pack
fn roles_for_pack(pack_id: &str) -> &'static [FixtureRole] {
    match pack_id {
        PACK_HTTP_CACHE => &[FixtureRole::EdgeNode, FixtureRole::Cache, FixtureRole::Origin],
        PACK_LATENCY_OBSERVABILITY => &[
            FixtureRole::EdgeNode,
            FixtureRole::LoadBalancer,
            FixtureRole::Tracer,
        ],
        PACK_FAULT_INJECTION => &[FixtureRole::Injector],
        _ => &[],
    }
}

/// Lowercased alphanumeric words of a text
fn words(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// One recommended pack and the evidence behind it
#[derive(Debug, Clone, PartialEq)]
pub struct PackRecommendation {
    pub pack_id: String,
    pub confidence: f64,
    pub reasons: Vec<String>,
    /// Ids of the risk rules that contributed
    pub source_rules: Vec<String>,
}

impl PackRecommendation {
    fn new(pack_id: &str) -> Self {
        Self {
            pack_id: pack_id.to_string(),
            confidence: 0.0,
            reasons: Vec::new(),
            source_rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdvisorResult {
    /// Sorted by descending confidence
    pub recommendations: Vec<PackRecommendation>,
    pub patterns_consulted: bool,
    /// Risk rules at or above the threshold
    pub total_rules_matched: usize,
    /// Of those, rules whose evidence shares a word with the description.
    /// Informational only; confidence is unaffected.
    pub description_matches: usize,
}

impl AdvisorResult {
    /// The `n` most confident recommendations
    pub fn top(&self, n: usize) -> &[PackRecommendation] {
        &self.recommendations[..n.min(self.recommendations.len())]
    }

    /// Pack ids at or above `min_confidence`
    pub fn pack_ids(&self, min_confidence: f64) -> Vec<&str> {
        self.recommendations
            .iter()
            .filter(|r| r.confidence >= min_confidence)
            .map(|r| r.pack_id.as_str())
            .collect()
    }
}

/// Per-pack accumulator preserving first-seen order for stable ties
#[derive(Default)]
struct Scores {
    packs: Vec<PackRecommendation>,
    index: HashMap<String, usize>,
}

impl Scores {
    fn entry(&mut self, pack_id: &str) -> &mut PackRecommendation {
        let pos = match self.index.get(pack_id) {
            Some(&pos) => pos,
            None => {
                self.index.insert(pack_id.to_string(), self.packs.len());
                self.packs.push(PackRecommendation::new(pack_id));
                self.packs.len() - 1
            }
        };
        &mut self.packs[pos]
    }

    fn into_sorted(self) -> Vec<PackRecommendation> {
        let mut packs = self.packs;
        packs.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        packs
    }
}

pub struct PackAdvisor {
    patterns: Option<LearnedPatterns>,
}

impl PackAdvisor {
    pub fn new(patterns: Option<LearnedPatterns>) -> Self {
        Self { patterns }
    }

    /// Advisor over the most recent document in a store (or none)
    pub fn from_store(store: &PatternStore, knowledge_id: Option<&str>) -> Self {
        Self::new(store.load(knowledge_id))
    }

    pub fn has_patterns(&self) -> bool {
        self.patterns.is_some()
    }

    pub fn patterns(&self) -> Option<&LearnedPatterns> {
        self.patterns.as_ref()
    }

    /// Rank packs from the loaded patterns.
    ///
    /// Without patterns the result is empty and `patterns_consulted` is false.
    pub fn recommend(&self, min_confidence: f64, description: Option<&str>) -> AdvisorResult {
        let patterns = match &self.patterns {
            Some(patterns) => patterns,
            None => return AdvisorResult::default(),
        };

        let description_words = description.map(words).unwrap_or_default();
        let mut scores = Scores::default();
        let mut rules_matched = 0;
        let mut description_matches = 0;

        // Pass 1: risk rules
        for rule in patterns.applicable_risk_rules(min_confidence) {
            rules_matched += 1;
            if !description_words.is_empty()
                && rule
                    .derived_from
                    .iter()
                    .any(|evidence| !words(evidence).is_disjoint(&description_words))
            {
                description_matches += 1;
            }

            for pack_id in &rule.recommended_packs {
                let rec = scores.entry(pack_id);
                rec.confidence = accumulate(rec.confidence, rule.confidence);
                rec.reasons.push(rule.description.clone());
                rec.source_rules.push(rule.rule_id.clone());
            }
        }

        // Pass 2: fixture roles
        for fixture in patterns.high_confidence_fixtures(min_confidence) {
            for pack_id in packs_for_role(fixture.inferred_role) {
                let rec = scores.entry(pack_id);
                rec.confidence = accumulate(rec.confidence, fixture.confidence * FIXTURE_BOOST);
                rec.reasons.push(format!(
                    "Fixture '{}' suggests {}",
                    fixture.name, fixture.inferred_role
                ));
            }
        }

        // Pass 3: assertion templates
        for template in &patterns.assertion_templates {
            let packs = packs_for_assertion(template.pattern_type);
            if packs.is_empty() {
                continue;
            }
            let boost = f64::min(0.1 + template.occurrences as f64 * 0.02, 0.4);
            if boost < min_confidence {
                continue;
            }
            for pack_id in packs {
                let rec = scores.entry(pack_id);
                rec.confidence = accumulate(rec.confidence, boost);
                rec.reasons.push(format!(
                    "{}x {} assertions",
                    template.occurrences, template.pattern_type
                ));
            }
        }

        tracing::debug!(rules_matched, description_matches, "scored packs");

        AdvisorResult {
            recommendations: scores.into_sorted(),
            patterns_consulted: true,
            total_rules_matched: rules_matched,
            description_matches,
        }
    }

    /// Evidence strings of every rule recommending `pack_id`
    pub fn signals_for_pack(&self, pack_id: &str) -> Vec<String> {
        let patterns = match &self.patterns {
            Some(patterns) => patterns,
            None => return Vec::new(),
        };
        patterns
            .risk_rules
            .iter()
            .filter(|r| r.recommended_packs.iter().any(|p| p == pack_id))
            .flat_map(|r| r.derived_from.iter().cloned())
            .collect()
    }

    /// Names of confident fixtures whose role is relevant to `pack_id`
    pub fn matching_fixtures(&self, pack_id: &str) -> Vec<String> {
        let patterns = match &self.patterns {
            Some(patterns) => patterns,
            None => return Vec::new(),
        };
        let roles = roles_for_pack(pack_id);
        patterns
            .fixtures
            .iter()
            .filter(|f| {
                roles.contains(&f.inferred_role) && f.confidence > MATCHING_FIXTURE_CONFIDENCE
            })
            .map(|f| f.name.clone())
            .collect()
    }
}
