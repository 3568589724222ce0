//! Pattern Store - persisted learned knowledge
//!
//! Each analyzed corpus gets one JSON document under `knowledge/learned/`,
//! named by a knowledge id derived from the analyzed root. Stores written by
//! older versions kept a single unlabeled document at
//! `.poet/learned_patterns.json`; it is still read when no labeled document
//! exists.
//!
//! Reading never fails hard: a missing or corrupt document is `None`. Writing
//! is the only operation that returns an error.

use crate::core::error::{LearnerError, Result, ResultExt};
use crate::core::models::LearnedPatterns;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Directory holding one document per knowledge id
pub const KNOWLEDGE_DIR: &str = "knowledge/learned";

/// Legacy single-document location
pub const LEGACY_POET_DIR: &str = ".poet";
pub const LEGACY_PATTERNS_FILE: &str = "learned_patterns.json";

/// Maximum length of the readable part of a knowledge id
const KNOWLEDGE_NAME_MAX: usize = 20;

/// Derive a stable knowledge id from an analyzed path.
///
/// The id is the cleaned lowercase basename (at most 20 characters of
/// `[a-z0-9_-]`) followed by the first 8 hex characters of the SHA-256 of the
/// resolved path, e.g. `edge-tests-1a2b3c4d`.
pub fn generate_knowledge_id(source_path: &Path) -> String {
    let resolved = std::fs::canonicalize(source_path).unwrap_or_else(|_| source_path.to_path_buf());

    let name = resolved
        .file_name()
        .or_else(|| resolved.parent().and_then(|p| p.file_name()))
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "unknown".to_string());
    let name: String = name
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .take(KNOWLEDGE_NAME_MAX)
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(resolved.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    let short_hash = &digest[..8];

    if name.is_empty() {
        short_hash.to_string()
    } else {
        format!("{}-{}", name, short_hash)
    }
}

/// Knowledge id used when nothing identifies the corpus
fn timestamped_knowledge_id() -> String {
    format!("learned-{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// File-backed store rooted at a base directory
#[derive(Debug, Clone)]
pub struct PatternStore {
    base_dir: PathBuf,
}

impl PatternStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn knowledge_dir(&self) -> PathBuf {
        self.base_dir.join(KNOWLEDGE_DIR)
    }

    /// Path of the document for a knowledge id
    pub fn knowledge_path(&self, knowledge_id: &str) -> PathBuf {
        self.knowledge_dir().join(format!("{}.json", knowledge_id))
    }

    /// Path of the legacy unlabeled document
    pub fn legacy_path(&self) -> PathBuf {
        self.base_dir
            .join(LEGACY_POET_DIR)
            .join(LEGACY_PATTERNS_FILE)
    }

    /// Document path for an id, or the legacy path when no id is given
    pub fn patterns_path(&self, knowledge_id: Option<&str>) -> PathBuf {
        match knowledge_id {
            Some(id) if !id.is_empty() => self.knowledge_path(id),
            _ => self.legacy_path(),
        }
    }

    /// Create the knowledge directory if needed
    pub fn ensure_knowledge_dir(&self) -> Result<PathBuf> {
        let dir = self.knowledge_dir();
        std::fs::create_dir_all(&dir)
            .map_err(LearnerError::from)
            .context(format!("creating {}", dir.display()))?;
        Ok(dir)
    }

    /// All labeled documents, sorted by file name
    pub fn list_knowledge_files(&self) -> Vec<PathBuf> {
        let dir = self.knowledge_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        files.sort();
        files
    }

    /// Persist `patterns`, returning the path written.
    ///
    /// Without an explicit id the document's existing id is reused, then one is
    /// derived from the first source path, then from the current time. The id
    /// and `updated_at` are stamped onto `patterns` before writing.
    pub fn save(
        &self,
        patterns: &mut LearnedPatterns,
        knowledge_id: Option<&str>,
    ) -> Result<PathBuf> {
        let knowledge_id = match knowledge_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ if !patterns.knowledge_id.is_empty() => patterns.knowledge_id.clone(),
            _ => match patterns.source_paths.first() {
                Some(first) => generate_knowledge_id(Path::new(first)),
                None => timestamped_knowledge_id(),
            },
        };

        patterns.knowledge_id = knowledge_id.clone();
        patterns.updated_at = Utc::now();

        self.ensure_knowledge_dir()?;
        let path = self.knowledge_path(&knowledge_id);
        Self::save_to_file(patterns, &path)?;

        tracing::info!(
            path = %path.display(),
            knowledge_id = %knowledge_id,
            "saved learned patterns"
        );
        Ok(path)
    }

    /// Load a document.
    ///
    /// With no id the last labeled document by file name wins, falling back to
    /// the legacy path. Returns `None` when nothing readable is found.
    pub fn load(&self, knowledge_id: Option<&str>) -> Option<LearnedPatterns> {
        let path = match knowledge_id {
            Some(id) if !id.is_empty() => self.knowledge_path(id),
            _ => self
                .list_knowledge_files()
                .pop()
                .unwrap_or_else(|| self.legacy_path()),
        };
        Self::load_from_file(&path)
    }

    /// Load from file path, returning `None` if the file doesn't exist or is malformed
    pub fn load_from_file(path: &Path) -> Option<LearnedPatterns> {
        if !path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read learned patterns");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(patterns) => Some(patterns),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "ignoring corrupt learned patterns"
                );
                None
            }
        }
    }

    /// Save to file path
    pub fn save_to_file(patterns: &LearnedPatterns, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(patterns)?;
        std::fs::write(path, json)
            .map_err(LearnerError::from)
            .context(format!("writing {}", path.display()))
    }
}
