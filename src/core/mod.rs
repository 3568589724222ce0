//! Core module for the poet pattern learner
//!
//! This module provides the pipeline that turns a pytest suite into reusable
//! knowledge. It follows a modular architecture for testability.
//!
//! # Architecture
//!
//! - `syntax`: Syntax walker producing a per-file inventory (tree-sitter)
//! - `walker`: Test file discovery with the TestFileSource trait
//! - `tables`: Static keyword and regex tables
//! - `extractor`: Cross-file pattern extraction and risk rules
//! - `models`: The persisted LearnedPatterns document and its merge
//! - `store`: Knowledge persistence under `knowledge/learned/`
//! - `advisor`: Pack recommendations from learned patterns
//! - `engine`: Main LearningEngine orchestration
//! - `config`: Learner configuration
//! - `error`: Error types using thiserror

pub mod advisor;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod models;
pub mod store;
pub mod syntax;
pub mod tables;
pub mod walker;

// Re-export commonly used types
pub use advisor::{AdvisorResult, PackAdvisor, PackRecommendation, MAX_PACK_CONFIDENCE};
pub use config::{LearnerConfig, CONFIG_FILE};
pub use engine::{LearnOutcome, LearningEngine};
pub use error::{LearnerError, Result, ResultExt};
pub use extractor::{extract_patterns, infer_fixture_role, PatternExtractor, RoleInference};
pub use models::{
    AssertionKind, AssertionTemplate, EndpointKind, EndpointPattern, ExtractedFixture,
    FaultInjectionPattern, FaultType, FixtureRole, LearnedPatterns, MetricType,
    ObservabilityPattern, RiskRule, Signal, SignalCategory, TimingAssertion, ToolType,
    PACK_FAULT_INJECTION, PACK_HTTP_CACHE, PACK_LATENCY_OBSERVABILITY,
};
pub use store::{generate_knowledge_id, PatternStore, KNOWLEDGE_DIR};
pub use syntax::{analyze_source, analyze_test_file, ParsedTestFile};
pub use walker::{discover_test_files, FsSource, TestFileSource};
