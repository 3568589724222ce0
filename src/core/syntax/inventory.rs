//! Parsed File Inventory - Flat, Typed Projection of a Test Module
//!
//! The inventory is what the syntax walker hands to the pattern extractor.
//! It is a pure projection of syntax: nothing in here ever requires running
//! the analyzed code, and a file that fails to parse still yields a valid
//! (empty) inventory.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Name of the shared-fixture configuration module
pub const FIXTURE_CONFIG_FILE: &str = "conftest.py";

/// Byte range of a syntax node within its source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Span {
    pub fn new(start_byte: usize, end_byte: usize) -> Self {
        Self {
            start_byte,
            end_byte,
        }
    }

    /// Slice this span out of `source`.
    ///
    /// Returns an empty string when the span is inverted, out of bounds, or
    /// does not fall on UTF-8 character boundaries.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        if self.start_byte > self.end_byte {
            return "";
        }
        source.get(self.start_byte..self.end_byte).unwrap_or("")
    }
}

/// A function or method definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub lineno: usize,
    pub end_lineno: usize,
    /// Positional parameter names, including `self`/`cls`
    pub args: Vec<String>,
    /// Decorator expressions as written, without the leading `@`
    pub decorators: Vec<String>,
    pub docstring: Option<String>,
    /// Full source of the definition, from `def` to the end of the body
    pub body_source: String,
    pub is_test: bool,
    pub is_fixture: bool,
    pub fixture_scope: String,
    pub class_name: Option<String>,
}

/// A class definition with the methods collected while walking its body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub lineno: usize,
    pub bases: Vec<String>,
    pub methods: Vec<FunctionInfo>,
    pub docstring: Option<String>,
}

/// An `import x` or `from x import y` statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub module: String,
    /// Bound names (alias when present, otherwise the imported name)
    pub names: Vec<String>,
    pub is_from_import: bool,
    pub lineno: usize,
}

/// Coarse syntactic position of a string literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralContext {
    CallArg,
    Assignment,
    Assert,
    Decorator,
    Return,
    Unknown,
}

impl LiteralContext {
    /// Context opened by entering a node of the given tree-sitter kind
    pub fn for_node_kind(kind: &str) -> Option<Self> {
        match kind {
            "argument_list" | "keyword_argument" => Some(LiteralContext::CallArg),
            "assignment" | "augmented_assignment" => Some(LiteralContext::Assignment),
            "assert_statement" => Some(LiteralContext::Assert),
            "decorator" => Some(LiteralContext::Decorator),
            "return_statement" => Some(LiteralContext::Return),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LiteralContext::CallArg => "call_arg",
            LiteralContext::Assignment => "assignment",
            LiteralContext::Assert => "assert",
            LiteralContext::Decorator => "decorator",
            LiteralContext::Return => "return",
            LiteralContext::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for LiteralContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string constant longer than two characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringLiteral {
    pub value: String,
    pub lineno: usize,
    pub context: LiteralContext,
    /// Callee of the enclosing call when the literal is one of its arguments
    pub parent_call: Option<String>,
}

/// An `assert` statement and its keyword classification
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssertInfo {
    pub lineno: usize,
    pub source: String,
    pub comparison_op: Option<String>,
    pub left_side: Option<String>,
    pub right_side: Option<String>,
    pub is_status_code: bool,
    pub is_header_check: bool,
    pub is_cache_check: bool,
    pub is_timing_check: bool,
}

impl AssertInfo {
    /// True when at least one of the four classification flags is set
    pub fn is_classified(&self) -> bool {
        self.is_status_code || self.is_header_check || self.is_cache_check || self.is_timing_check
    }
}

/// A call expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInfo {
    /// Callee as written, dotted for attribute access (`client.get`)
    pub func_name: String,
    pub lineno: usize,
    pub args: Vec<String>,
    pub kwargs: BTreeMap<String, String>,
    pub source: String,
}

/// Everything the walker found in one file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedTestFile {
    pub path: PathBuf,
    /// Raw source text, kept for the extractor's full-text sweeps
    pub source: String,
    /// Set when the source did not parse; all structural lists are empty then
    pub syntax_error: bool,
    pub imports: Vec<ImportInfo>,
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<ClassInfo>,
    pub string_literals: Vec<StringLiteral>,
    pub asserts: Vec<AssertInfo>,
    pub calls: Vec<CallInfo>,
    pub fixtures_used: BTreeSet<String>,
}

impl ParsedTestFile {
    /// An inventory with nothing in it
    pub fn empty(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    /// All test functions
    pub fn test_functions(&self) -> Vec<&FunctionInfo> {
        self.functions.iter().filter(|f| f.is_test).collect()
    }

    /// All fixture functions
    pub fn fixture_functions(&self) -> Vec<&FunctionInfo> {
        self.functions.iter().filter(|f| f.is_fixture).collect()
    }

    /// Classes that group tests (`Test*`)
    pub fn test_classes(&self) -> Vec<&ClassInfo> {
        self.classes
            .iter()
            .filter(|c| c.name.starts_with("Test"))
            .collect()
    }

    /// Whether this is the shared-fixture configuration module
    pub fn is_fixture_config(&self) -> bool {
        is_fixture_config_path(&self.path)
    }
}

/// Whether a path names the shared-fixture configuration module
pub fn is_fixture_config_path(path: &Path) -> bool {
    path.file_name()
        .map(|name| name == FIXTURE_CONFIG_FILE)
        .unwrap_or(false)
}
