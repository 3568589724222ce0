//! Benchmarks for the syntax walker and pattern extraction
//!
//! Run with: `cargo bench --bench analyzer`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use poet_learner::core::{analyze_source, extract_patterns, infer_fixture_role};

// =============================================================================
// Benchmark Data
// =============================================================================

const SMALL_SUITE: &str = r#"
import pytest

@pytest.fixture
def cdn_client():
    """HTTP client pointed at the edge."""
    return Client()

def test_hit(cdn_client):
    r = cdn_client.get("/static/app.js")
    assert r.headers["X-Cache"] == "HIT"
"#;

const CASE_TEMPLATE: &str = r#"
def test_case_{n}(edge_proxy, fault_injector):
    fault_injector.add_delay(ms={n})
    start = time.time()
    r = requests.get("/api/items/{n}", timeout=2)
    assert r.status_code == 200
    assert r.headers["Cache-Control"] == "max-age=60"
    assert time.time() - start < 1.5
"#;

/// A module with `cases` tests built from a fixed template
fn synthetic_suite(cases: usize) -> String {
    let mut source = String::from("import time\nimport requests\n");
    for n in 0..cases {
        source.push_str(&CASE_TEMPLATE.replace("{n}", &n.to_string()));
    }
    source
}

// =============================================================================
// Syntax walker
// =============================================================================

fn bench_analyze_source(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze_source");

    for cases in [1usize, 20, 200] {
        let source = if cases == 1 {
            SMALL_SUITE.to_string()
        } else {
            synthetic_suite(cases)
        };
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("tests", cases), &source, |b, src| {
            b.iter(|| analyze_source(black_box(src), "tests/test_bench.py"))
        });
    }

    group.finish();
}

// =============================================================================
// Extraction
// =============================================================================

fn bench_extract_patterns(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_patterns");

    for files in [1usize, 10, 50] {
        let parsed: Vec<_> = (0..files)
            .map(|i| analyze_source(&synthetic_suite(20), format!("tests/test_{}.py", i)))
            .collect();
        group.throughput(Throughput::Elements(files as u64));
        group.bench_with_input(BenchmarkId::new("files", files), &parsed, |b, parsed| {
            b.iter(|| extract_patterns(black_box(parsed)))
        });
    }

    group.finish();
}

fn bench_infer_fixture_role(c: &mut Criterion) {
    c.bench_function("infer_fixture_role", |b| {
        b.iter(|| {
            infer_fixture_role(
                black_box("fault_injector"),
                black_box("Inject latency via toxiproxy."),
                black_box("def fault_injector():\n    return Toxiproxy()\n"),
            )
        })
    });
}

criterion_group!(walker_benches, bench_analyze_source);
criterion_group!(extraction_benches, bench_extract_patterns, bench_infer_fixture_role);
criterion_main!(walker_benches, extraction_benches);
