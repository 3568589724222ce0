//! poet_learner - Static pattern learner for pytest suites
//!
//! This library parses an existing Python test suite without executing it,
//! learns reusable patterns (fixture roles, assertion templates, timing
//! thresholds, fault-injection idioms, observability tooling, endpoints) and
//! turns them into knowledge-pack recommendations. It is designed to be
//! consumed by:
//! - The CLI binary (src/bin/poet.rs)
//! - Other tools embedding the learner as a library
//!
//! # Architecture
//!
//! This crate follows the "Library-First" pattern:
//! - **lib.rs** (this file): Pure logic, no CLI concerns
//! - **bin/poet.rs**: Thin wrapper that calls the library
//!
//! ```no_run
//! use poet_learner::{LearningEngine, PackAdvisor, PatternStore};
//! use std::path::Path;
//!
//! let store = PatternStore::new(".");
//! let outcome = LearningEngine::new(store.clone())
//!     .learn(Path::new("tests"), None)
//!     .expect("learning failed");
//!
//! let advice = PackAdvisor::new(Some(outcome.patterns)).recommend(0.3, None);
//! for rec in advice.top(3) {
//!     println!("{} {:.2}", rec.pack_id, rec.confidence);
//! }
//! ```

pub mod core;

pub use crate::core::{
    analyze_source, analyze_test_file, discover_test_files, extract_patterns,
    generate_knowledge_id, AdvisorResult, LearnOutcome, LearnedPatterns, LearnerConfig,
    LearnerError, LearningEngine, PackAdvisor, PackRecommendation, ParsedTestFile,
    PatternExtractor, PatternStore, Result,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the version of the poet_learner library
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), "0.3.0");
    }
}
