//! Syntax walker integration tests
//!
//! These tests run the walker over realistic pytest modules and check the
//! inventory a downstream extractor relies on.

use poet_learner::core::syntax::{analyze_source, analyze_test_file, LiteralContext};
use std::fs;
use tempfile::TempDir;

const CDN_SUITE: &str = r#"
"""Edge cache behaviour."""
import time
import pytest
import requests as rq
from .helpers import purge_url, wait_for

BASE_URL = "http://localhost:8080"


@pytest.fixture(scope="module")
def edge_server(tmp_path_factory):
    """Start an nginx edge in front of the origin."""
    return start_edge(port=8080)


@pytest.fixture
def origin():
    return None


class TestCaching:
    """Cache hit/miss behaviour."""

    def test_second_request_hits(self, edge_server, origin):
        first = rq.get(BASE_URL + "/static/app.js")
        second = rq.get(BASE_URL + "/static/app.js")
        assert first.headers["X-Cache"] == "MISS"
        assert second.headers["X-Cache"] == "HIT"

    def helper(self):
        pass


def test_purge(edge_server, *extra, timeout=5):
    started = time.monotonic()
    purge_url(f"{BASE_URL}/static/app.js", reason="deploy-cleanup")
    elapsed = time.monotonic() - started
    assert elapsed < 2.0
    assert rq.get(BASE_URL).status_code == 200
"#;

#[test]
fn test_realistic_suite_inventory() {
    let parsed = analyze_source(CDN_SUITE, "tests/test_cdn.py");
    assert!(!parsed.syntax_error);

    // Imports
    let modules: Vec<&str> = parsed.imports.iter().map(|i| i.module.as_str()).collect();
    assert_eq!(modules, vec!["time", "pytest", "requests", "helpers"]);
    assert_eq!(parsed.imports[2].names, vec!["rq"]);
    assert!(parsed.imports[3].is_from_import);
    assert_eq!(parsed.imports[3].names, vec!["purge_url", "wait_for"]);

    // Functions, in source order, methods included
    let names: Vec<&str> = parsed.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["edge_server", "origin", "test_second_request_hits", "helper", "test_purge"]
    );
    assert_eq!(parsed.test_functions().len(), 2);
    assert_eq!(parsed.fixture_functions().len(), 2);

    let edge = &parsed.functions[0];
    assert!(edge.is_fixture);
    assert_eq!(edge.fixture_scope, "module");
    assert_eq!(edge.args, vec!["tmp_path_factory"]);
    assert_eq!(
        edge.docstring.as_deref(),
        Some("Start an nginx edge in front of the origin.")
    );
    assert!(edge.body_source.starts_with("def edge_server"));

    assert_eq!(parsed.functions[1].fixture_scope, "function");

    let purge = &parsed.functions[4];
    assert_eq!(purge.args, vec!["edge_server"]);
    assert!(purge.class_name.is_none());
    assert_eq!(
        parsed.functions[2].class_name.as_deref(),
        Some("TestCaching")
    );

    // Classes
    assert_eq!(parsed.classes.len(), 1);
    assert_eq!(parsed.test_classes().len(), 1);
    let class = &parsed.classes[0];
    assert_eq!(class.methods.len(), 2);
    assert_eq!(class.docstring.as_deref(), Some("Cache hit/miss behaviour."));

    // Fixture consumption excludes self
    let used: Vec<&str> = parsed.fixtures_used.iter().map(String::as_str).collect();
    assert_eq!(used, vec!["edge_server", "origin", "tmp_path_factory"]);
}

#[test]
fn test_realistic_suite_asserts() {
    let parsed = analyze_source(CDN_SUITE, "tests/test_cdn.py");
    assert_eq!(parsed.asserts.len(), 4);

    let miss = &parsed.asserts[0];
    assert!(miss.is_header_check);
    assert!(miss.is_cache_check);
    assert_eq!(miss.comparison_op.as_deref(), Some("=="));
    assert_eq!(miss.right_side.as_deref(), Some("\"MISS\""));

    let timing = &parsed.asserts[2];
    assert!(timing.is_timing_check);
    assert!(!timing.is_status_code);
    assert_eq!(timing.comparison_op.as_deref(), Some("<"));
    assert_eq!(timing.left_side.as_deref(), Some("elapsed"));

    let status = &parsed.asserts[3];
    assert!(status.is_status_code);
    assert!(status.source.starts_with("assert rq.get(BASE_URL)"));
}

#[test]
fn test_realistic_suite_calls_and_literals() {
    let parsed = analyze_source(CDN_SUITE, "tests/test_cdn.py");

    let purge = parsed
        .calls
        .iter()
        .find(|c| c.func_name == "purge_url")
        .unwrap();
    assert_eq!(purge.kwargs.get("reason").map(String::as_str), Some("\"deploy-cleanup\""));
    assert_eq!(purge.args.len(), 1);

    let gets = parsed.calls.iter().filter(|c| c.func_name == "rq.get").count();
    assert_eq!(gets, 3);

    let literal = |value: &str| parsed.string_literals.iter().find(|l| l.value == value);

    let base = literal("http://localhost:8080").unwrap();
    assert_eq!(base.context, LiteralContext::Assignment);
    assert!(base.parent_call.is_none());

    let path = literal("/static/app.js").unwrap();
    assert_eq!(path.context, LiteralContext::CallArg);
    assert_eq!(path.parent_call.as_deref(), Some("rq.get"));

    let hit = literal("HIT").unwrap();
    assert_eq!(hit.context, LiteralContext::Assert);

    let reason = literal("deploy-cleanup").unwrap();
    assert_eq!(reason.parent_call.as_deref(), Some("purge_url"));

    // f-string literal part
    assert!(literal("/static/app.js").is_some());
    assert!(parsed
        .string_literals
        .iter()
        .all(|l| l.value.chars().count() > 2));
}

#[test]
fn test_broken_module_degrades_to_empty_inventory() {
    let source = "import pytest\n\ndef test_broken(:\n    assert tcpdump_running()\n";
    let parsed = analyze_source(source, "tests/test_broken.py");

    assert!(parsed.syntax_error);
    assert!(parsed.functions.is_empty());
    assert!(parsed.imports.is_empty());
    assert!(parsed.asserts.is_empty());
    assert_eq!(parsed.source, source);
}

#[test]
fn test_analyze_file_from_disk_matches_in_memory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test_cdn.py");
    fs::write(&path, CDN_SUITE).unwrap();

    let from_disk = analyze_test_file(&path).unwrap();
    let in_memory = analyze_source(CDN_SUITE, &path);
    assert_eq!(from_disk, in_memory);
}

#[test]
fn test_analysis_is_idempotent() {
    let first = analyze_source(CDN_SUITE, "tests/test_cdn.py");
    let second = analyze_source(CDN_SUITE, "tests/test_cdn.py");
    assert_eq!(first, second);
}

#[test]
fn test_empty_module() {
    let parsed = analyze_source("", "tests/test_empty.py");
    assert!(!parsed.syntax_error);
    assert!(parsed.functions.is_empty());
    assert!(parsed.string_literals.is_empty());
}
