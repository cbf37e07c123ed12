// CLI commands for grading and inspecting exercises
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use verdict_common::config::Config;
use verdict_common::types::{CaseResult, Language, Mode, TestCaseRecord};
use verdict_engine::config::LanguageConfigManager;
use verdict_engine::expander::expand_with_report;
use verdict_engine::instrument::instrument_with_report;
use verdict_engine::judge0::Judge0Client;
use verdict_engine::orchestrator::{Orchestrator, PassOutcome, PassReport};
use verdict_engine::region::{MarkerRegionCodec, RegionCodec};

/// Question data as exported by the authoring tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionFile {
    #[serde(default)]
    pub title: Option<String>,
    /// Boilerplate source per language name
    #[serde(default)]
    pub boilerplate: HashMap<String, String>,
    pub test_cases: Vec<TestCaseRecord>,
}

impl QuestionFile {
    pub fn boilerplate_for(&self, language: Language) -> Option<&str> {
        self.boilerplate.get(&language.to_string()).map(String::as_str)
    }
}

fn load_question(path: &Path) -> Result<QuestionFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read question file {}", path.display()))?;
    parse_question(&content)
}

fn parse_question(content: &str) -> Result<QuestionFile> {
    serde_json::from_str(content).context("Failed to parse question file")
}

fn load_languages() -> LanguageConfigManager {
    let config = Config::from_env();
    LanguageConfigManager::load(Path::new(&config.languages_config)).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Using built-in Judge0 language ids");
        LanguageConfigManager::default()
    })
}

fn format_case_line(position: usize, result: &CaseResult) -> String {
    let mark = if result.passed { "✅" } else { "❌" };
    let mut line = format!(
        "  {} Case {:<3} {:<16} {:>9.2} ms {:>8} KB",
        mark,
        position,
        result.atomic_id,
        result.display_time_ms(),
        result.memory_kb
    );
    if !result.passed {
        if result.error.is_empty() {
            line.push_str(&format!(
                "\n       expected: {:?}\n       actual:   {:?}",
                result.expected_output, result.actual_output
            ));
        } else {
            let first = result.error.lines().next().unwrap_or("");
            line.push_str(&format!("\n       error: {}", first));
        }
    }
    line
}

fn print_report(report: &PassReport) {
    if let Some(message) = &report.compile_error {
        println!("❌ Compilation failed:\n{}\n", message);
    }
    for shortfall in &report.shortfalls {
        println!(
            "⚠️  Record {} declares {} cases but carries {}",
            shortfall.record_id, shortfall.declared, shortfall.available
        );
    }

    if report.outcome == PassOutcome::NoApplicableCases {
        println!("Nothing to run: no {} cases in this question.", report.mode);
        return;
    }

    for (idx, result) in report.results.iter().enumerate() {
        println!("{}", format_case_line(idx + 1, result));
    }

    let summary = &report.summary;
    println!("{}", "─".repeat(60));
    println!(
        "Passed {}/{}  avg {:.2} ms  avg {:.0} KB",
        summary.passed_count, summary.total_count, summary.avg_time_ms, summary.avg_memory_kb
    );
    if !summary.failed_ordinals.is_empty() {
        let failed: Vec<String> = summary.failed_ordinals.iter().map(|n| n.to_string()).collect();
        println!("Failed cases: {}", failed.join(", "));
    }
    if report.mode == Mode::Submit {
        if report.all_passed() {
            println!("✅ Accepted");
        } else {
            println!("❌ Not accepted");
        }
    }
}

/// Grade a source file against a question through the configured Judge0 backend
pub async fn grade(
    question_path: &Path,
    source_path: &Path,
    language: Language,
    mode: Mode,
    merge_into_boilerplate: bool,
    json: bool,
) -> Result<()> {
    let question = load_question(question_path)?;
    let source = fs::read_to_string(source_path)
        .with_context(|| format!("Failed to read source file {}", source_path.display()))?;

    let code = if merge_into_boilerplate {
        let Some(boilerplate) = question.boilerplate_for(language) else {
            bail!("Question has no {} boilerplate to merge into", language);
        };
        MarkerRegionCodec.merge_region(boilerplate, &source, language)
    } else {
        source
    };

    let config = Config::from_env();
    let client = Judge0Client::new(&config, load_languages()).context("Failed to build Judge0 client")?;
    let orchestrator = Orchestrator::new(Arc::new(client));

    if !json {
        let title = question.title.as_deref().unwrap_or("question");
        println!("🚀 Grading {} ({}, {} mode)\n", title, language, mode);
    }

    let report = orchestrator.run(&code, language, &question.test_cases, mode).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Print the atomic cases every record of a question expands into
pub fn expand(question_path: &Path, json: bool) -> Result<()> {
    let question = load_question(question_path)?;

    let expansions: Vec<_> = question.test_cases.iter().map(expand_with_report).collect();

    if json {
        let cases: Vec<_> = expansions.iter().flat_map(|e| e.cases.iter()).collect();
        println!("{}", serde_json::to_string_pretty(&cases)?);
        return Ok(());
    }

    for (record, expansion) in question.test_cases.iter().zip(&expansions) {
        let pool = if record.hidden { "hidden" } else { "visible" };
        println!("📋 Record {} ({}) -> {} case(s)", record.id, pool, expansion.cases.len());
        if let Some(shortfall) = &expansion.shortfall {
            println!("  ⚠️  declares {} cases, carries {}", shortfall.declared, shortfall.available);
        }
        for case in &expansion.cases {
            println!("  {:<16} input: {:?}  expected: {:?}", case.atomic_id, case.input, case.expected_output);
        }
    }
    Ok(())
}

/// Print the source as it would be sent to the backend
pub fn instrument(source_path: &Path, language: Language) -> Result<()> {
    let source = fs::read_to_string(source_path)
        .with_context(|| format!("Failed to read source file {}", source_path.display()))?;

    let instrumented = instrument_with_report(&source, language);
    if !instrumented.probes_inserted {
        eprintln!("⚠️  No complete RUNTIME CALC marker pair found for {}", language);
    }
    print!("{}", instrumented.code);
    Ok(())
}

/// List the configured languages and their backend ids
pub fn list_languages() -> Result<()> {
    let manager = load_languages();

    println!("📋 Languages:\n");
    println!("{:<12} {:<10}", "NAME", "JUDGE0 ID");
    println!("{}", "─".repeat(24));
    for language in Language::ALL {
        println!("{:<12} {:<10}", language.to_string(), manager.judge0_id(&language));
    }

    let configured = manager.list_languages();
    if configured.is_empty() {
        println!("\n💡 No languages.json found; showing built-in ids");
    }
    Ok(())
}
