//! poet CLI - learn patterns from a pytest suite and recommend knowledge packs
//!
//! This binary follows the "Thin Interface" pattern: clap parses arguments and
//! every piece of real work is delegated to the library.

// Exclude from coverage - CLI binary tested via integration tests
#![cfg_attr(tarpaulin, ignore)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use poet_learner::core::{LearnerConfig, LearningEngine, PackAdvisor, PatternStore};
use poet_learner::LearnedPatterns;
use std::io;
use std::path::{Path, PathBuf};

/// Learn reusable testing patterns from an existing pytest suite.
#[derive(Parser, Debug)]
#[command(name = "poet")]
#[command(version = poet_learner::VERSION)]
#[command(about = "Learn reusable testing patterns from an existing pytest suite")]
#[command(after_help = "Examples:
  # Learn from a test directory (merges with existing knowledge)
  poet learn tests/

  # Start over instead of merging
  poet learn tests/ --replace

  # Inspect what was learned
  poet show --section fixtures

  # Ask for pack recommendations
  poet recommend --description \"purge cached assets on deploy\"
")]
struct Cli {
    /// Verbose logging (debug level unless RUST_LOG is set)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a test file or directory and persist the learned patterns
    Learn {
        /// Test file or directory to analyze
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Base directory for knowledge/ and .poet/
        #[arg(short = 'o', long = "output", value_name = "DIR", default_value = ".")]
        output: PathBuf,

        /// Replace stored knowledge instead of merging into it
        #[arg(long = "replace")]
        replace: bool,

        /// Explicit knowledge id (default: derived from PATH)
        #[arg(long = "knowledge-id", value_name = "ID")]
        knowledge_id: Option<String>,
    },

    /// Display learned patterns
    Show {
        /// Base directory containing knowledge/
        #[arg(short = 'd', long = "dir", value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        #[arg(long = "knowledge-id", value_name = "ID")]
        knowledge_id: Option<String>,

        /// Show a single section
        #[arg(short = 's', long = "section", value_enum)]
        section: Option<Section>,

        /// Print the raw JSON document
        #[arg(long = "json")]
        json: bool,
    },

    /// Recommend knowledge packs from learned patterns
    Recommend {
        /// Base directory containing knowledge/
        #[arg(short = 'd', long = "dir", value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        #[arg(long = "knowledge-id", value_name = "ID")]
        knowledge_id: Option<String>,

        /// Feature description to match rule evidence against
        #[arg(long = "description", value_name = "TEXT")]
        description: Option<String>,

        /// Minimum confidence (default: from .poet/config.json, else 0.3)
        #[arg(long = "min-confidence", value_name = "F")]
        min_confidence: Option<f64>,

        /// Number of recommendations to show
        #[arg(long = "top", value_name = "N", default_value_t = 5)]
        top: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Section {
    Signals,
    Fixtures,
    Assertions,
    Timing,
    Observability,
    Faults,
    Endpoints,
    Rules,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Learn {
            path,
            output,
            replace,
            knowledge_id,
        } => run_learn(&path, &output, replace, knowledge_id.as_deref(), cli.verbose),
        Command::Show {
            dir,
            knowledge_id,
            section,
            json,
        } => run_show(&dir, knowledge_id.as_deref(), section, json),
        Command::Recommend {
            dir,
            knowledge_id,
            description,
            min_confidence,
            top,
        } => run_recommend(
            &dir,
            knowledge_id.as_deref(),
            description.as_deref(),
            min_confidence,
            top,
        ),
    }
}

fn run_learn(
    path: &Path,
    output: &Path,
    replace: bool,
    knowledge_id: Option<&str>,
    verbose: bool,
) -> Result<()> {
    let mut config = LearnerConfig::load(output)?;
    if replace {
        config = config.with_merge(false);
    }

    let engine = LearningEngine::new(PatternStore::new(output)).with_config(config);
    let outcome = engine
        .learn(path, knowledge_id)
        .with_context(|| format!("learning from {}", path.display()))?;

    let patterns = &outcome.patterns;
    println!("Learning complete");
    println!("  Files discovered:         {}", outcome.files_discovered);
    if outcome.files_skipped > 0 {
        println!("  Files skipped:            {}", outcome.files_skipped);
    }
    if outcome.syntax_errors > 0 {
        println!("  Files with syntax errors: {}", outcome.syntax_errors);
    }
    print_statistics(patterns);
    println!(
        "  Saved to:                 {}{}",
        outcome.saved_path.display(),
        if outcome.merged { " (merged)" } else { "" }
    );

    print_fixtures(patterns, 8);
    print_rules(patterns, 5);
    if verbose {
        print_assertions(patterns, 5);
    }
    Ok(())
}

fn load_patterns(dir: &Path, knowledge_id: Option<&str>) -> Result<LearnedPatterns> {
    let store = PatternStore::new(dir);
    match store.load(knowledge_id) {
        Some(patterns) => Ok(patterns),
        None => bail!(
            "No learned patterns found under {} (expected {} or {}). Run 'poet learn <PATH>' first.",
            dir.display(),
            store.knowledge_dir().display(),
            store.patterns_path(knowledge_id).display()
        ),
    }
}

fn run_show(
    dir: &Path,
    knowledge_id: Option<&str>,
    section: Option<Section>,
    json: bool,
) -> Result<()> {
    let patterns = load_patterns(dir, knowledge_id)?;

    if json {
        let text = serde_json::to_string_pretty(&patterns).context("serializing patterns")?;
        println!("{}", text);
        return Ok(());
    }

    match section {
        None => {
            println!("Knowledge base: {}", patterns.knowledge_id);
            println!("  Created: {}", patterns.created_at.format("%Y-%m-%d %H:%M"));
            println!("  Updated: {}", patterns.updated_at.format("%Y-%m-%d %H:%M"));
            println!("  Sources: {} paths analyzed", patterns.source_paths.len());
            print_statistics(&patterns);
            print_fixtures(&patterns, 10);
            print_rules(&patterns, usize::MAX);
        }
        Some(Section::Fixtures) => print_fixtures(&patterns, usize::MAX),
        Some(Section::Rules) => print_rules(&patterns, usize::MAX),
        Some(Section::Assertions) => print_assertions(&patterns, 20),
        Some(Section::Signals) => {
            let mut signals: Vec<_> = patterns.signals.iter().collect();
            signals.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
            println!("Signals");
            for s in signals.iter().take(20) {
                println!(
                    "  {:<40} {:<18} {:>4}x",
                    truncate(&s.value, 40),
                    s.category,
                    s.occurrences
                );
            }
        }
        Some(Section::Timing) => {
            println!("Timing assertions");
            for t in &patterns.timing_assertions {
                let threshold = t
                    .threshold_value
                    .map(|v| format!("{} {}{}", t.comparison, v, t.threshold_unit))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:<12} {:<14} {:>4}x  {}",
                    t.metric_type,
                    threshold,
                    t.occurrences,
                    truncate(&t.context, 50)
                );
            }
        }
        Some(Section::Observability) => {
            println!("Observability patterns");
            for o in patterns.observability_patterns.iter().take(30) {
                println!(
                    "  {:<14} {}:{}  {}",
                    o.tool_type,
                    o.source_file,
                    o.line_number,
                    truncate(&o.pattern, 40)
                );
            }
        }
        Some(Section::Faults) => {
            println!("Fault injection patterns");
            for f in &patterns.fault_injection_patterns {
                println!(
                    "  {:<18} {:>4}x  {}",
                    f.fault_type,
                    f.occurrences,
                    f.source_files.join(", ")
                );
            }
        }
        Some(Section::Endpoints) => {
            println!("Endpoints");
            for e in patterns.endpoints.iter().take(30) {
                let marker = if e.is_parameterized { " (parameterized)" } else { "" };
                println!(
                    "  {:<6} {:<40} {:>4}x{}",
                    e.pattern_type,
                    truncate(&e.value, 40),
                    e.occurrences,
                    marker
                );
            }
        }
    }
    Ok(())
}

fn run_recommend(
    dir: &Path,
    knowledge_id: Option<&str>,
    description: Option<&str>,
    min_confidence: Option<f64>,
    top: usize,
) -> Result<()> {
    let min_confidence = match min_confidence {
        Some(value) => value,
        None => LearnerConfig::load(dir)?.min_confidence,
    };

    let advisor = PackAdvisor::from_store(&PatternStore::new(dir), knowledge_id);
    if !advisor.has_patterns() {
        load_patterns(dir, knowledge_id)?;
    }

    let result = advisor.recommend(min_confidence, description);
    if result.recommendations.is_empty() {
        println!("No pack recommendations at confidence >= {:.2}", min_confidence);
        return Ok(());
    }

    println!("Pack recommendations ({} rules matched)", result.total_rules_matched);
    if description.is_some() {
        println!("  Rules matching description: {}", result.description_matches);
    }
    for rec in result.top(top) {
        println!("  {:<40} {:>4.0}%", rec.pack_id, rec.confidence * 100.0);
        for reason in &rec.reasons {
            println!("    - {}", reason);
        }
        let fixtures = advisor.matching_fixtures(&rec.pack_id);
        if !fixtures.is_empty() {
            println!("    fixtures: {}", fixtures.join(", "));
        }
    }
    Ok(())
}

fn print_statistics(patterns: &LearnedPatterns) {
    println!("  Files analyzed:           {}", patterns.total_files_analyzed);
    println!("  Test functions:           {}", patterns.total_test_functions);
    println!("  Test classes:             {}", patterns.total_test_classes);
    println!("  Signals:                  {}", patterns.signals.len());
    println!("  Fixtures:                 {}", patterns.fixtures.len());
    println!("  Assertion templates:      {}", patterns.assertion_templates.len());
    println!("  Timing assertions:        {}", patterns.timing_assertions.len());
    println!("  Observability patterns:   {}", patterns.observability_patterns.len());
    println!("  Fault injection patterns: {}", patterns.fault_injection_patterns.len());
    println!("  Endpoints:                {}", patterns.endpoints.len());
    println!("  Risk rules derived:       {}", patterns.risk_rules.len());
}

fn print_fixtures(patterns: &LearnedPatterns, limit: usize) {
    if patterns.fixtures.is_empty() {
        return;
    }
    let mut fixtures: Vec<_> = patterns.fixtures.iter().collect();
    fixtures.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    println!();
    println!("Fixtures (inferred roles)");
    for f in fixtures.iter().take(limit) {
        let indicators = if f.role_indicators.is_empty() {
            "-".to_string()
        } else {
            f.role_indicators.iter().take(2).cloned().collect::<Vec<_>>().join(", ")
        };
        println!(
            "  {:<28} {:<14} {:>4.0}%  {:<10} {}",
            truncate(&f.name, 28),
            f.inferred_role,
            f.confidence * 100.0,
            f.scope,
            truncate(&indicators, 40)
        );
    }
}

fn print_rules(patterns: &LearnedPatterns, limit: usize) {
    if patterns.risk_rules.is_empty() {
        return;
    }
    let mut rules: Vec<_> = patterns.risk_rules.iter().collect();
    rules.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    println!();
    println!("Risk rules");
    for rule in rules.iter().take(limit) {
        println!("  {} ({:.0}%)", rule.description, rule.confidence * 100.0);
        println!("    recommend: {}", rule.recommended_packs.join(", "));
    }
}

fn print_assertions(patterns: &LearnedPatterns, limit: usize) {
    if patterns.assertion_templates.is_empty() {
        return;
    }
    let mut templates: Vec<_> = patterns.assertion_templates.iter().collect();
    templates.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));

    println!();
    println!("Assertion patterns");
    for t in templates.iter().take(limit) {
        println!("  [{}] {}x  {}", t.pattern_type, t.occurrences, truncate(&t.template, 60));
        if !t.expected_values.is_empty() {
            let values: Vec<&str> = t.expected_values.iter().take(5).map(String::as_str).collect();
            println!("    expected values: {}", values.join(", "));
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
