//! Orchestrator - One Grading Pass
//!
//! **Core Responsibility:**
//! Drive a pass end to end: select the mode's case pool, instrument the code
//! once, call the execution backend once per record, and hand each raw
//! result to the reconciler.
//!
//! **Ordering:**
//! Calls are strictly sequential and in record order. result[i] is matched
//! to record[i] by position, never by a backend request id.
//!
//! **Failure handling (nothing escapes as an error):**
//! - Compile error: no further calls; every remaining atomic case fails
//!   with the compiler message
//! - Transport error: that record's cases fail with the client error text,
//!   the next record is still executed
//! - Runtime error in a packed record: cases the process never got to
//!   print fail with the runtime message
//! - Empty pool: `NoApplicableCases`, and the backend is never called

use crate::aggregator::summarize;
use crate::client::ExecutionClient;
use crate::expander::{expand_with_report, Shortfall};
use crate::instrument::{instrument_with_report, split_timing_line};
use crate::reconciler::{reconcile, runtime_error_message};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use verdict_common::types::{
    AtomicCase, CaseResult, Language, Mode, RawExecutionResult, ResultSummary, Snapshot,
    TestCaseRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    /// Every applicable record was dispatched (individual cases may still fail)
    Completed,
    /// The mode selected no cases; nothing was executed
    NoApplicableCases,
    /// The code did not compile; results carry the compiler message
    CompileFailed,
}

impl PassOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassOutcome::Completed => "completed",
            PassOutcome::NoApplicableCases => "no_applicable_cases",
            PassOutcome::CompileFailed => "compile_failed",
        }
    }
}

/// Everything one pass produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub mode: Mode,
    pub outcome: PassOutcome,
    pub results: Vec<CaseResult>,
    pub summary: ResultSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_error: Option<String>,
    /// Data-quality conditions met while expanding records
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shortfalls: Vec<Shortfall>,
}

impl PassReport {
    fn empty(mode: Mode) -> Self {
        Self {
            mode,
            outcome: PassOutcome::NoApplicableCases,
            results: Vec::new(),
            summary: ResultSummary::default(),
            compile_error: None,
            shortfalls: Vec::new(),
        }
    }

    /// Rebuild a report from a restored snapshot
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            mode: snapshot.mode,
            outcome: PassOutcome::Completed,
            summary: summarize(&snapshot.results),
            results: snapshot.results.clone(),
            compile_error: None,
            shortfalls: Vec::new(),
        }
    }

    /// True iff at least one case ran and every case passed
    pub fn all_passed(&self) -> bool {
        self.summary.all_passed()
    }
}

/// Replace the backend's timing with the probe's and drop the probe line.
/// If the end probe never ran there is no tagged line and time stays absent.
fn apply_probe_timing(mut raw: RawExecutionResult) -> RawExecutionResult {
    let (stdout, probe_ms) = split_timing_line(&raw.stdout);
    raw.stdout = stdout;
    raw.time_ms = probe_ms;
    raw
}

/// A packed record whose process failed only produced output for its first
/// few cases. The rest fail with the runtime message.
fn fail_unreached(results: &mut [CaseResult], raw: &RawExecutionResult) {
    let printed = raw.stdout.trim().lines().count();
    let message = runtime_error_message(raw);

    for result in results.iter_mut().skip(printed) {
        result.passed = false;
        result.error = message.clone();
    }
}

fn fail_all<'a>(
    cases: &'a [AtomicCase],
    error: &'a str,
    is_submission: bool,
) -> impl Iterator<Item = CaseResult> + 'a {
    cases.iter().map(move |case| CaseResult::failed(case, error, is_submission))
}

pub struct Orchestrator {
    client: Arc<dyn ExecutionClient>,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn ExecutionClient>) -> Self {
        Self { client }
    }

    #[tracing::instrument(skip_all, fields(language = %language, mode = %mode, records = records.len()))]
    pub async fn run(
        &self,
        code: &str,
        language: Language,
        records: &[TestCaseRecord],
        mode: Mode,
    ) -> PassReport {
        let pool: Vec<&TestCaseRecord> = records.iter().filter(|r| mode.selects(r.hidden)).collect();
        if pool.is_empty() {
            info!(records = records.len(), "No applicable cases for mode");
            return PassReport::empty(mode);
        }

        let instrumented = instrument_with_report(code, language);
        let is_submission = mode == Mode::Submit;

        let mut results: Vec<CaseResult> = Vec::new();
        let mut shortfalls = Vec::new();
        let mut compile_error: Option<String> = None;

        for record in pool {
            let expansion = expand_with_report(record);
            if let Some(shortfall) = expansion.shortfall {
                warn!(
                    record_id = %shortfall.record_id,
                    declared = shortfall.declared,
                    available = shortfall.available,
                    "Record declares more cases than it contains"
                );
                shortfalls.push(shortfall);
            }

            let cases = expansion.cases;
            if cases.is_empty() {
                debug!(record_id = %record.id, "Record has no cases, skipping");
                continue;
            }

            if let Some(message) = &compile_error {
                results.extend(fail_all(&cases, message, is_submission));
                continue;
            }

            let raw = match self.client.execute(language, &instrumented.code, &record.input).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(record_id = %record.id, error = %e, "Execution call failed");
                    results.extend(fail_all(&cases, &e.to_string(), is_submission));
                    continue;
                }
            };

            if let Some(message) = &raw.compile_error {
                warn!(record_id = %record.id, "Compilation failed, skipping remaining records");
                results.extend(fail_all(&cases, message, is_submission));
                compile_error = Some(message.clone());
                continue;
            }

            let raw = if instrumented.probes_inserted {
                apply_probe_timing(raw)
            } else {
                raw
            };

            let mut graded = reconcile(record, &cases, &raw, is_submission);
            if cases.len() > 1 && raw.is_runtime_failure() {
                fail_unreached(&mut graded, &raw);
            }

            debug!(
                record_id = %record.id,
                cases = graded.len(),
                passed = graded.iter().filter(|r| r.passed).count(),
                "Record graded"
            );
            results.extend(graded);
        }

        let outcome = if compile_error.is_some() {
            PassOutcome::CompileFailed
        } else if results.is_empty() {
            PassOutcome::NoApplicableCases
        } else {
            PassOutcome::Completed
        };

        let summary = summarize(&results);
        info!(
            outcome = outcome.as_str(),
            passed = summary.passed_count,
            total = summary.total_count,
            "Pass finished"
        );

        PassReport {
            mode,
            outcome,
            results,
            summary,
            compile_error,
            shortfalls,
        }
    }
}
