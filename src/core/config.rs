//! Learner configuration loaded from `.poet/config.json`

use crate::core::error::{LearnerError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Location of the configuration file relative to the base directory
pub const CONFIG_FILE: &str = ".poet/config.json";

/// Runtime configuration, passed explicitly to the engine
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LearnerConfig {
    /// Extra directory names excluded from discovery
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Candidate files larger than this many bytes are skipped
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Default recommendation threshold
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Merge new results into the most recent stored document
    #[serde(default = "default_merge")]
    pub merge: bool,
}

fn default_max_file_size() -> u64 {
    1_048_576 // 1MB
}

fn default_min_confidence() -> f64 {
    0.3
}

fn default_merge() -> bool {
    true
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            max_file_size: default_max_file_size(),
            min_confidence: default_min_confidence(),
            merge: default_merge(),
        }
    }
}

impl LearnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the configuration file under `base_dir`
    pub fn path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Load from `<base_dir>/.poet/config.json`, falling back to defaults
    /// when the file does not exist
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = Self::path_in(base_dir);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(LearnerError::from)
            .context(format!("reading {}", path.display()))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            LearnerError::invalid_config(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(LearnerError::invalid_config(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.max_file_size == 0 {
            return Err(LearnerError::invalid_config("max_file_size must be positive"));
        }
        Ok(())
    }

    /// Builder pattern: add an excluded directory name
    pub fn with_ignore(mut self, dir_name: &str) -> Self {
        self.ignore.push(dir_name.to_string());
        self
    }

    /// Builder pattern: set merge behaviour
    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    /// Builder pattern: set the file size limit
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) {
        let path = LearnerConfig::path_in(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = LearnerConfig::load(dir.path()).unwrap();
        assert_eq!(config, LearnerConfig::default());
        assert_eq!(config.max_file_size, 1_048_576);
        assert!(config.merge);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, r#"{"ignore": ["fixtures_data"], "merge": false}"#);

        let config = LearnerConfig::load(dir.path()).unwrap();
        assert_eq!(config.ignore, vec!["fixtures_data"]);
        assert!(!config.merge);
        assert_eq!(config.min_confidence, 0.3);
    }

    #[test]
    fn test_malformed_file_is_invalid_config() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "{ not json");
        let err = LearnerConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, LearnerError::InvalidConfig { .. }));
    }

    #[test]
    fn test_out_of_range_confidence_rejected() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, r#"{"min_confidence": 1.5}"#);
        let err = LearnerConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("min_confidence"));
    }

    #[test]
    fn test_builder() {
        let config = LearnerConfig::new()
            .with_ignore("generated")
            .with_merge(false)
            .with_max_file_size(10);
        assert_eq!(config.ignore, vec!["generated"]);
        assert!(!config.merge);
        assert_eq!(config.max_file_size, 10);
    }
}
