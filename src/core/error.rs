//! Error types for the learner
//!
//! Only hard failures live here. Syntax errors, unreadable candidate files and
//! corrupt persisted documents are recovered from where they happen and never
//! reach this type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for learner operations
pub type Result<T> = std::result::Result<T, LearnerError>;

/// Errors that can occur while learning or persisting patterns
#[derive(Error, Debug)]
pub enum LearnerError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input path does not exist
    #[error("Path not found: {path}")]
    PathNotFound { path: PathBuf },

    /// Discovery found nothing to analyze
    #[error("No test files found under {path} (looking for test_*.py, *_test.py, conftest.py)")]
    NoTestFiles { path: PathBuf },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<LearnerError>,
    },
}

impl LearnerError {
    /// Wrap an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        LearnerError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        LearnerError::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(ctx))
    }
}
