//! Tree-sitter walker for Python test modules
//!
//! A single recursive descent over the syntax tree that fills a
//! [`ParsedTestFile`]. Functions and classes are visited once, every `assert`
//! is classified by keyword membership, and string constants are recorded with
//! the innermost syntactic context on a traversal stack.

use std::path::PathBuf;
use tree_sitter::{Node, Parser, Tree};

use super::inventory::{
    AssertInfo, CallInfo, ClassInfo, FunctionInfo, ImportInfo, LiteralContext, ParsedTestFile,
    Span, StringLiteral,
};
use crate::core::tables::{
    contains_any, CACHE_VOCABULARY, FIXTURE_SCOPE, HEADER_VOCABULARY, STATUS_VOCABULARY,
    TIMING_VOCABULARY,
};

const DEFAULT_FIXTURE_SCOPE: &str = "function";

/// String constants must be longer than this many characters to be recorded
const MIN_LITERAL_CHARS: usize = 2;

/// Parse Python source, returning `None` when the grammar cannot be loaded
/// or the parser gives up
pub fn parse_python(source: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .ok()?;
    parser.parse(source, None)
}

/// Walks one source file and accumulates its inventory
pub struct TestAnalyzer<'s> {
    source: &'s str,
    path: PathBuf,
    inventory: ParsedTestFile,
    current_class: Option<String>,
    context_stack: Vec<LiteralContext>,
    call_stack: Vec<String>,
}

impl<'s> TestAnalyzer<'s> {
    pub fn new(source: &'s str, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            source,
            inventory: ParsedTestFile::empty(path.clone(), source),
            path,
            current_class: None,
            context_stack: Vec::new(),
            call_stack: Vec::new(),
        }
    }

    /// Parse and walk the source.
    ///
    /// Text that does not parse cleanly yields an inventory with no
    /// structural entries and `syntax_error` set.
    pub fn analyze(mut self) -> ParsedTestFile {
        let tree = match parse_python(self.source) {
            Some(tree) => tree,
            None => {
                tracing::debug!(path = %self.path.display(), "parser produced no tree");
                return self.syntax_error();
            }
        };

        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!(path = %self.path.display(), "syntax error, skipping structure");
            return self.syntax_error();
        }

        self.visit(root);
        self.inventory
    }

    fn syntax_error(self) -> ParsedTestFile {
        ParsedTestFile {
            syntax_error: true,
            ..ParsedTestFile::empty(self.path, self.source)
        }
    }

    fn text(&self, node: &Node) -> &'s str {
        Span::new(node.start_byte(), node.end_byte()).slice(self.source)
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "function_definition" => self.visit_function(node, Vec::new()),
            "class_definition" => self.visit_class(node),
            "decorated_definition" => self.visit_decorated(node),
            "import_statement" => self.visit_import(node),
            "import_from_statement" => self.visit_import_from(node),
            "assert_statement" => self.visit_assert(node),
            "call" => self.visit_call(node),
            "string" => self.visit_string(node),
            "concatenated_string" => self.visit_concatenated_string(node),
            _ => self.visit_children(node),
        }
    }

    /// Recurse into children, opening a literal context when the node kind
    /// defines one
    fn visit_children(&mut self, node: Node) {
        let context = LiteralContext::for_node_kind(node.kind());
        if let Some(ctx) = context {
            self.context_stack.push(ctx);
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }

        if context.is_some() {
            self.context_stack.pop();
        }
    }

    fn visit_decorated(&mut self, node: Node) {
        let mut decorators = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "decorator" {
                decorators.push(self.text(&child).trim_start_matches('@').trim().to_string());
                self.visit(child);
            }
        }

        match node.child_by_field_name("definition") {
            Some(def) if def.kind() == "function_definition" => {
                self.visit_function(def, decorators)
            }
            Some(def) => self.visit(def),
            None => {}
        }
    }

    fn visit_function(&mut self, node: Node, decorators: Vec<String>) {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(&n).to_string())
            .unwrap_or_default();

        let (is_fixture, fixture_scope) = fixture_marker(&decorators);
        let args = node
            .child_by_field_name("parameters")
            .map(|p| self.positional_parameters(p))
            .unwrap_or_default();

        for arg in &args {
            if arg != "self" && arg != "cls" {
                self.inventory.fixtures_used.insert(arg.clone());
            }
        }

        let body = node.child_by_field_name("body");
        let docstring = body.and_then(|b| self.docstring(b));

        self.inventory.functions.push(FunctionInfo {
            is_test: name.starts_with("test"),
            name,
            lineno: line_of(&node),
            end_lineno: node.end_position().row + 1,
            args,
            decorators,
            docstring,
            body_source: self.text(&node).to_string(),
            is_fixture,
            fixture_scope,
            class_name: self.current_class.clone(),
        });

        if let Some(params) = node.child_by_field_name("parameters") {
            self.visit(params);
        }
        if let Some(body) = body {
            self.visit(body);
        }
    }

    /// Names of parameters that can be passed positionally
    fn positional_parameters(&self, params: Node) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = params.walk();

        for child in params.named_children(&mut cursor) {
            let name = match child.kind() {
                "identifier" => Some(self.text(&child).to_string()),
                "typed_parameter" => {
                    // `*args: T` nests a splat pattern instead of an identifier
                    if first_child_of_kind(&child, "list_splat_pattern").is_some()
                        || first_child_of_kind(&child, "dictionary_splat_pattern").is_some()
                    {
                        break;
                    }
                    first_child_of_kind(&child, "identifier").map(|n| self.text(&n).to_string())
                }
                "default_parameter" | "typed_default_parameter" => child
                    .child_by_field_name("name")
                    .map(|n| self.text(&n).to_string()),
                "keyword_separator" | "list_splat_pattern" | "dictionary_splat_pattern" => break,
                _ => None,
            };
            if let Some(name) = name {
                names.push(name);
            }
        }

        names
    }

    fn visit_class(&mut self, node: Node) {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(&n).to_string())
            .unwrap_or_default();

        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                if matches!(base.kind(), "identifier" | "attribute") {
                    bases.push(self.text(&base).to_string());
                }
            }
        }

        let body = node.child_by_field_name("body");
        let docstring = body.and_then(|b| self.docstring(b));

        let previous_class = self.current_class.replace(name.clone());
        let first_method = self.inventory.functions.len();
        if let Some(body) = body {
            self.visit(body);
        }
        let methods = self.inventory.functions[first_method..].to_vec();
        self.current_class = previous_class;

        self.inventory.classes.push(ClassInfo {
            name,
            lineno: line_of(&node),
            bases,
            methods,
            docstring,
        });
    }

    fn visit_import(&mut self, node: Node) {
        let lineno = line_of(&node);
        let mut cursor = node.walk();
        for child in node.children_by_field_name("name", &mut cursor) {
            let (module, bound) = self.imported_name(child);
            self.inventory.imports.push(ImportInfo {
                module,
                names: vec![bound],
                is_from_import: false,
                lineno,
            });
        }
    }

    fn visit_import_from(&mut self, node: Node) {
        let module = node
            .child_by_field_name("module_name")
            .map(|m| self.text(&m).trim_start_matches('.').to_string())
            .unwrap_or_default();

        let mut names = Vec::new();
        let mut cursor = node.walk();
        for child in node.children_by_field_name("name", &mut cursor) {
            names.push(self.imported_name(child).1);
        }
        if first_child_of_kind(&node, "wildcard_import").is_some() {
            names.push("*".to_string());
        }

        self.inventory.imports.push(ImportInfo {
            module,
            names,
            is_from_import: true,
            lineno: line_of(&node),
        });
    }

    /// (imported path, locally bound name) for `x` or `x as y`
    fn imported_name(&self, node: Node) -> (String, String) {
        if node.kind() == "aliased_import" {
            let name = node
                .child_by_field_name("name")
                .map(|n| self.text(&n).to_string())
                .unwrap_or_default();
            let alias = node
                .child_by_field_name("alias")
                .map(|n| self.text(&n).to_string())
                .unwrap_or_else(|| name.clone());
            (name, alias)
        } else {
            let name = self.text(&node).to_string();
            (name.clone(), name)
        }
    }

    fn visit_assert(&mut self, node: Node) {
        let source = self.text(&node).to_string();
        let lowered = source.to_lowercase();

        let mut info = AssertInfo {
            lineno: line_of(&node),
            is_status_code: contains_any(&lowered, STATUS_VOCABULARY),
            is_header_check: contains_any(&lowered, HEADER_VOCABULARY),
            is_cache_check: contains_any(&lowered, CACHE_VOCABULARY),
            is_timing_check: contains_any(&lowered, TIMING_VOCABULARY),
            ..AssertInfo::default()
        };

        if let Some(test) = node.named_child(0) {
            if test.kind() == "comparison_operator" {
                info.comparison_op = test
                    .child_by_field_name("operators")
                    .map(|op| op.kind().to_string());
                info.left_side = test.named_child(0).map(|n| self.text(&n).to_string());
                info.right_side = test.named_child(1).map(|n| self.text(&n).to_string());
            }
        }

        info.source = source;
        self.inventory.asserts.push(info);

        self.context_stack.push(LiteralContext::Assert);
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
        self.context_stack.pop();
    }

    fn visit_call(&mut self, node: Node) {
        let function = node.child_by_field_name("function");
        let func_name = function
            .filter(|f| matches!(f.kind(), "identifier" | "attribute"))
            .map(|f| self.text(&f).to_string())
            .unwrap_or_default();

        let mut args = Vec::new();
        let mut kwargs = std::collections::BTreeMap::new();
        let arguments = node.child_by_field_name("arguments");

        if let Some(arguments) = arguments {
            if arguments.kind() == "argument_list" {
                let mut cursor = arguments.walk();
                for arg in arguments.named_children(&mut cursor) {
                    match arg.kind() {
                        "keyword_argument" => {
                            let key = arg.child_by_field_name("name");
                            let value = arg.child_by_field_name("value");
                            if let (Some(key), Some(value)) = (key, value) {
                                kwargs.insert(
                                    self.text(&key).to_string(),
                                    self.text(&value).to_string(),
                                );
                            }
                        }
                        "dictionary_splat" | "comment" => {}
                        _ => args.push(self.text(&arg).to_string()),
                    }
                }
            } else {
                args.push(self.text(&arguments).to_string());
            }
        }

        self.inventory.calls.push(CallInfo {
            func_name: func_name.clone(),
            lineno: line_of(&node),
            args,
            kwargs,
            source: self.text(&node).to_string(),
        });

        if let Some(function) = function {
            self.visit(function);
        }
        if let Some(arguments) = arguments {
            self.call_stack.push(func_name);
            self.visit(arguments);
            self.call_stack.pop();
        }
    }

    fn visit_string(&mut self, node: Node) {
        let lineno = line_of(&node);
        match self.string_parts(node) {
            StringParts::Bytes => {}
            StringParts::Plain(value) => self.record_literal(value, lineno),
            StringParts::Formatted(parts) => {
                for part in parts {
                    self.record_literal(part, lineno);
                }
                // Expressions inside `{...}` may hold calls and nested strings
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "interpolation" {
                        self.visit_children(child);
                    }
                }
            }
        }
    }

    /// Adjacent plain literals fold into one value; anything else is visited
    /// part by part
    fn visit_concatenated_string(&mut self, node: Node) {
        let mut cursor = node.walk();
        let strings: Vec<Node> = node
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "string")
            .collect();

        let mut joined = Some(String::new());
        for string in &strings {
            match (self.string_parts(*string), joined.as_mut()) {
                (StringParts::Plain(value), Some(acc)) => acc.push_str(&value),
                _ => joined = None,
            }
        }

        match joined {
            Some(value) => self.record_literal(value, line_of(&node)),
            None => {
                for string in strings {
                    self.visit_string(string);
                }
            }
        }
    }

    fn record_literal(&mut self, value: String, lineno: usize) {
        if value.chars().count() <= MIN_LITERAL_CHARS {
            return;
        }

        let context = self
            .context_stack
            .last()
            .copied()
            .unwrap_or(LiteralContext::Unknown);
        let parent_call = if context == LiteralContext::CallArg {
            self.call_stack.last().filter(|c| !c.is_empty()).cloned()
        } else {
            None
        };

        self.inventory.string_literals.push(StringLiteral {
            value,
            lineno,
            context,
            parent_call,
        });
    }

    /// Decode a `string` node into its value
    fn string_parts(&self, node: Node) -> StringParts {
        let start = first_child_of_kind(&node, "string_start");
        let end = first_child_of_kind(&node, "string_end");
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            _ => return StringParts::Plain(String::new()),
        };

        let prefix: String = self
            .text(&start)
            .chars()
            .take_while(|c| *c != '"' && *c != '\'')
            .collect::<String>()
            .to_ascii_lowercase();
        let raw = prefix.contains('r');

        if prefix.contains('b') {
            return StringParts::Bytes;
        }

        if prefix.contains('f') {
            let mut parts = Vec::new();
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "string_content" {
                    let text = self.text(&child).replace("{{", "{").replace("}}", "}");
                    parts.push(decode_escapes(&text, raw));
                }
            }
            return StringParts::Formatted(parts);
        }

        let body = Span::new(start.end_byte(), end.start_byte()).slice(self.source);
        StringParts::Plain(decode_escapes(body, raw))
    }

    /// Docstring of a function or class body, cleaned like `inspect.cleandoc`
    fn docstring(&self, body: Node) -> Option<String> {
        let mut cursor = body.walk();
        let first = body
            .named_children(&mut cursor)
            .find(|n| n.kind() != "comment")?;
        if first.kind() != "expression_statement" {
            return None;
        }

        let expr = first.named_child(0)?;
        let value = match expr.kind() {
            "string" => match self.string_parts(expr) {
                StringParts::Plain(value) => value,
                _ => return None,
            },
            "concatenated_string" => {
                let mut joined = String::new();
                let mut cursor = expr.walk();
                for part in expr.named_children(&mut cursor) {
                    match self.string_parts(part) {
                        StringParts::Plain(value) => joined.push_str(&value),
                        _ => return None,
                    }
                }
                joined
            }
            _ => return None,
        };

        Some(clean_docstring(&value))
    }
}

enum StringParts {
    Plain(String),
    Formatted(Vec<String>),
    Bytes,
}

fn line_of(node: &Node) -> usize {
    node.start_position().row + 1
}

fn first_child_of_kind<'t>(node: &Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

/// Whether any decorator registers a fixture, and its declared scope
fn fixture_marker(decorators: &[String]) -> (bool, String) {
    for decorator in decorators {
        if decorator.to_lowercase().contains("fixture") {
            let scope = FIXTURE_SCOPE
                .captures(decorator)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| DEFAULT_FIXTURE_SCOPE.to_string());
            return (true, scope);
        }
    }
    (false, DEFAULT_FIXTURE_SCOPE.to_string())
}

/// Resolve backslash escapes in a non-raw literal body
fn decode_escapes(text: &str, raw: bool) -> String {
    if raw || !text.contains('\\') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\n') => {}
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0c}'),
            Some('v') => out.push('\u{0b}'),
            Some(d @ '0'..='7') => {
                let mut digits = d.to_string();
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(n @ '0'..='7') => {
                            digits.push(*n);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                match u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('\\');
                        out.push_str(&digits);
                    }
                }
            }
            Some(kind @ ('x' | 'u' | 'U')) => {
                let width = match kind {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = (0..width).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == width => out.push(decoded),
                    _ => {
                        out.push('\\');
                        out.push(kind);
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

/// Strip docstring indentation: the first line loses leading whitespace,
/// later lines lose their common indentation, and blank edges are dropped
pub fn clean_docstring(text: &str) -> String {
    let expanded = text.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let indent = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
    cleaned.push(lines[0].trim_start().to_string());
    for line in &lines[1..] {
        let stripped = line.get(indent..).unwrap_or_else(|| line.trim_start());
        cleaned.push(stripped.trim_end().to_string());
    }

    while cleaned.first().map(|l| l.trim().is_empty()).unwrap_or(false) {
        cleaned.remove(0);
    }
    while cleaned.last().map(|l| l.trim().is_empty()).unwrap_or(false) {
        cleaned.pop();
    }

    cleaned.join("\n")
}
