//! Test file discovery
//!
//! This module provides the TestFileSource trait, the seam through which the
//! engine finds and reads candidate files, and the filesystem implementation.

use crate::core::config::LearnerConfig;
use crate::core::error::{LearnerError, Result};
use crate::core::syntax::FIXTURE_CONFIG_FILE;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

#[cfg(test)]
use mockall::automock;

/// Test module naming conventions
pub const TEST_FILE_GLOBS: &[&str] = &["test_*.py", "*_test.py"];

/// Directory names never descended into
pub const EXCLUDED_DIRS: &[&str] = &[
    "venv",
    "env",
    ".venv",
    "node_modules",
    "__pycache__",
    "build",
    "dist",
    "target",
    "site-packages",
];

/// Normalize path separators so source file keys match across platforms
pub fn normalize_path_separators(path: &Path) -> String {
    let mut normalized = path.to_string_lossy().to_string();

    // Strip Windows UNC prefix (\\?\ or \\.\)
    if normalized.starts_with(r"\\?\") || normalized.starts_with(r"\\.\") {
        normalized = normalized[4..].to_string();
    }

    normalized.replace('\\', "/")
}

/// Where the engine gets its candidate files from
///
/// This trait allows for mocking in tests (unreadable files, fixed corpora)
/// without touching the filesystem.
#[cfg_attr(test, automock)]
pub trait TestFileSource {
    /// Sorted candidate test files under `root`
    fn discover(&self, root: &Path, config: &LearnerConfig) -> Result<Vec<PathBuf>>;

    /// Source text of one file; `None` when unreadable, oversized or not UTF-8
    fn read_source(&self, path: &Path, max_file_size: u64) -> Option<String>;
}

/// Filesystem-backed source
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSource;

impl FsSource {
    pub fn new() -> Self {
        Self
    }
}

impl TestFileSource for FsSource {
    fn discover(&self, root: &Path, config: &LearnerConfig) -> Result<Vec<PathBuf>> {
        discover_test_files(root, config)
    }

    fn read_source(&self, path: &Path, max_file_size: u64) -> Option<String> {
        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                return None;
            }
        };
        if size > max_file_size {
            tracing::warn!(
                path = %path.display(),
                size,
                limit = max_file_size,
                "skipping oversized file"
            );
            return None;
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                return None;
            }
        };
        match String::from_utf8(bytes) {
            Ok(source) => Some(source),
            Err(_) => {
                tracing::warn!(path = %path.display(), "skipping file that is not valid UTF-8");
                None
            }
        }
    }
}

fn test_file_globs() -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in TEST_FILE_GLOBS {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// Whether a file name follows the test module convention
pub fn is_test_file_name(name: &str) -> bool {
    test_file_globs().is_match(name)
}

/// Whether an explicitly named single file should be analyzed
fn accepts_single_file(path: &Path) -> bool {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => return false,
    };
    if is_test_file_name(&name) || name == FIXTURE_CONFIG_FILE {
        return true;
    }
    name.ends_with(".py") && name.to_lowercase().contains("test")
}

fn is_excluded_dir(entry: &DirEntry, extra: &[String]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || EXCLUDED_DIRS.contains(&name.as_ref())
        || extra.iter().any(|e| e == name.as_ref())
}

/// Enumerate candidate test files under `root`, sorted.
///
/// A file root is returned on its own when it looks like a test module. For a
/// directory, excluded segments are matched only below the root itself.
pub fn discover_test_files(root: &Path, config: &LearnerConfig) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(LearnerError::PathNotFound {
            path: root.to_path_buf(),
        });
    }

    if root.is_file() {
        return Ok(if accepts_single_file(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let globs = test_file_globs();
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded_dir(e, &config.ignore))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            globs.is_match(name.as_ref()) || name == FIXTURE_CONFIG_FILE
        })
        .map(|e| e.into_path())
        .collect();

    files.sort();
    tracing::debug!(root = %root.display(), count = files.len(), "discovered test files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "def test_x():\n    pass\n").unwrap();
    }

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| normalize_path_separators(p.strip_prefix(root).unwrap()))
            .collect()
    }

    #[test]
    fn test_discovers_tests_and_conftest_only() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "tests/test_one.py");
        touch(dir.path(), "tests/conftest.py");
        touch(dir.path(), "tests/helper.py");

        let files = discover_test_files(dir.path(), &LearnerConfig::default()).unwrap();
        assert_eq!(
            names(dir.path(), &files),
            vec!["tests/conftest.py", "tests/test_one.py"]
        );
    }

    #[test]
    fn test_suffix_convention() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "pkg/cache_test.py");
        touch(dir.path(), "pkg/testing_utils.py");

        let files = discover_test_files(dir.path(), &LearnerConfig::default()).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["pkg/cache_test.py"]);
    }

    #[test]
    fn test_excluded_directories() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "tests/test_keep.py");
        touch(dir.path(), ".git/test_hidden.py");
        touch(dir.path(), "venv/lib/test_venv.py");
        touch(dir.path(), "node_modules/x/test_dep.py");
        touch(dir.path(), "build/test_built.py");
        touch(dir.path(), "tests/__pycache__/test_cached.py");
        touch(dir.path(), "generated/test_gen.py");

        let config = LearnerConfig::default().with_ignore("generated");
        let files = discover_test_files(dir.path(), &config).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["tests/test_keep.py"]);
    }

    #[test]
    fn test_hidden_root_is_not_excluded() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join(".hidden_root");
        touch(&root, "test_inside.py");

        let files = discover_test_files(&root, &LearnerConfig::default()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_single_file_rules() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "test_a.py");
        touch(dir.path(), "mytests.py");
        touch(dir.path(), "helper.py");

        let config = LearnerConfig::default();
        assert_eq!(
            discover_test_files(&dir.path().join("test_a.py"), &config)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            discover_test_files(&dir.path().join("mytests.py"), &config)
                .unwrap()
                .len(),
            1
        );
        assert!(discover_test_files(&dir.path().join("helper.py"), &config)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = TempDir::new().unwrap();
        let err = discover_test_files(&dir.path().join("nope"), &LearnerConfig::default())
            .unwrap_err();
        assert!(matches!(err, LearnerError::PathNotFound { .. }));
    }

    #[test]
    fn test_output_sorted() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "z/test_z.py");
        touch(dir.path(), "a/test_a.py");
        touch(dir.path(), "m/test_m.py");

        let files = discover_test_files(dir.path(), &LearnerConfig::default()).unwrap();
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }

    #[test]
    fn test_fs_source_skips_oversized_and_invalid() {
        let dir = TempDir::new().unwrap();
        let big = dir.path().join("test_big.py");
        std::fs::write(&big, "x = 1\n".repeat(100)).unwrap();
        let bad = dir.path().join("test_bad.py");
        std::fs::write(&bad, [0xffu8, 0xfe]).unwrap();

        let source = FsSource::new();
        assert!(source.read_source(&big, 10).is_none());
        assert!(source.read_source(&big, 10_000).is_some());
        assert!(source.read_source(&bad, 10_000).is_none());
        assert!(source
            .read_source(&dir.path().join("test_missing.py"), 10_000)
            .is_none());
    }

    #[test]
    fn test_normalize_path_separators() {
        assert_eq!(
            normalize_path_separators(Path::new(r"tests\unit\test_a.py")),
            "tests/unit/test_a.py"
        );
        assert_eq!(
            normalize_path_separators(Path::new(r"\\?\C:\proj\test_a.py")),
            "C:/proj/test_a.py"
        );
    }
}
