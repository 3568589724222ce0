//! Learning Engine - orchestration for the pattern learner
//!
//! The LearningEngine runs the whole pipeline for one root: discovery,
//! per-file analysis, extraction, optional merge with stored knowledge and
//! persistence.

use std::path::{Path, PathBuf};

use crate::core::config::LearnerConfig;
use crate::core::error::{LearnerError, Result};
use crate::core::extractor::PatternExtractor;
use crate::core::models::LearnedPatterns;
use crate::core::store::{generate_knowledge_id, PatternStore};
use crate::core::syntax::analyze_source;
use crate::core::walker::{FsSource, TestFileSource};

/// What a learning run produced
#[derive(Debug, Clone)]
pub struct LearnOutcome {
    /// The document as saved (merged when a merge happened)
    pub patterns: LearnedPatterns,
    pub saved_path: PathBuf,
    pub files_discovered: usize,
    /// Candidates that could not be read
    pub files_skipped: usize,
    /// Files analyzed despite a syntax error
    pub syntax_errors: usize,
    pub merged: bool,
}

/// The main learning engine
pub struct LearningEngine {
    /// Engine configuration
    config: LearnerConfig,
    /// Where candidate files come from
    source: Box<dyn TestFileSource>,
    /// Where knowledge is persisted
    store: PatternStore,
}

impl LearningEngine {
    /// Create an engine persisting under `store`, with default configuration
    pub fn new(store: PatternStore) -> Self {
        Self {
            config: LearnerConfig::default(),
            source: Box::new(FsSource::new()),
            store,
        }
    }

    /// Builder: set configuration
    pub fn with_config(mut self, config: LearnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Builder: set a custom file source
    pub fn with_source(mut self, source: impl TestFileSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    /// Analyze every candidate under `root` into one aggregate.
    ///
    /// Returns the patterns together with (discovered, skipped, syntax error)
    /// counts. Nothing is persisted.
    pub fn extract(&self, root: &Path) -> Result<(LearnedPatterns, usize, usize, usize)> {
        let files = self.source.discover(root, &self.config)?;
        if files.is_empty() {
            return Err(LearnerError::NoTestFiles {
                path: root.to_path_buf(),
            });
        }

        let mut extractor = PatternExtractor::new();
        let mut skipped = 0;
        let mut syntax_errors = 0;

        for path in &files {
            let source = match self.source.read_source(path, self.config.max_file_size) {
                Some(source) => source,
                None => {
                    skipped += 1;
                    continue;
                }
            };

            let parsed = analyze_source(&source, path);
            if parsed.syntax_error {
                tracing::warn!(
                    path = %path.display(),
                    "syntax error, only full-text patterns extracted"
                );
                syntax_errors += 1;
            }
            extractor.add_file(&parsed);
        }

        tracing::debug!(
            discovered = files.len(),
            skipped,
            syntax_errors,
            "analysis complete"
        );
        Ok((extractor.finish(), files.len(), skipped, syntax_errors))
    }

    /// Run the full pipeline and persist the result.
    ///
    /// When merging is enabled, the new patterns are folded into the stored
    /// document for the explicit id, or into the most recent document, and
    /// the result is saved under that document's id. Otherwise the id is the
    /// explicit one or is derived from `root`.
    pub fn learn(&self, root: &Path, knowledge_id: Option<&str>) -> Result<LearnOutcome> {
        let (mut patterns, files_discovered, files_skipped, syntax_errors) = self.extract(root)?;

        let existing = if self.config.merge {
            self.store.load(knowledge_id)
        } else {
            None
        };
        let merged = existing.is_some();
        let mut patterns = match existing {
            Some(existing) => {
                tracing::info!(
                    knowledge_id = %existing.knowledge_id,
                    "merging with stored patterns"
                );
                existing.merge(patterns)
            }
            None => {
                patterns.knowledge_id = generate_knowledge_id(root);
                patterns
            }
        };

        let saved_path = self.store.save(&mut patterns, knowledge_id)?;

        Ok(LearnOutcome {
            patterns,
            saved_path,
            files_discovered,
            files_skipped,
            syntax_errors,
            merged,
        })
    }
}
