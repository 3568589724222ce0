//! Syntax walker
//!
//! Turns one Python test module into a flat [`ParsedTestFile`] inventory
//! without executing anything. No state is shared between files.

pub mod analyzer;
pub mod inventory;

use std::path::Path;

pub use analyzer::{clean_docstring, parse_python, TestAnalyzer};
pub use inventory::{
    is_fixture_config_path, AssertInfo, CallInfo, ClassInfo, FunctionInfo, ImportInfo,
    LiteralContext, ParsedTestFile, Span, StringLiteral, FIXTURE_CONFIG_FILE,
};

/// Analyze source text attributed to `path`
pub fn analyze_source(source: &str, path: impl AsRef<Path>) -> ParsedTestFile {
    TestAnalyzer::new(source, path.as_ref()).analyze()
}

/// Read and analyze one file.
///
/// Returns `None` when the file cannot be read or is not valid UTF-8.
pub fn analyze_test_file(path: &Path) -> Option<ParsedTestFile> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read test file");
            return None;
        }
    };

    match String::from_utf8(bytes) {
        Ok(source) => Some(analyze_source(&source, path)),
        Err(_) => {
            tracing::warn!(path = %path.display(), "test file is not valid UTF-8");
            None
        }
    }
}
