//! Reconciler - Raw Output to Graded Cases
//!
//! **Core Responsibility:**
//! Map one backend result back onto the atomic cases of the record that
//! produced it and decide pass/fail for each.
//!
//! **Critical Properties:**
//! - Knows nothing about HTTP or the execution backend
//! - Knows nothing about instrumentation
//! - Pure function: (atomic cases, raw result) → case results
//!
//! **Rules:**
//! - Single case: trimmed stdout must equal trimmed expected output, and
//!   the process must have exited 0 with empty stderr
//! - Packed record: trimmed stdout is split into lines; line `i` is the
//!   actual output of case `i` and is judged by trimmed equality alone,
//!   since one process produced all of them
//! - Missing lines are empty actual output, never a panic
//! - Time and memory are per process, so every case of a record gets the
//!   same figures
//!
//! **Normalization:**
//! - Leading/trailing whitespace trimmed (covers \r\n vs \n at the ends)
//! - Case-sensitive, internal whitespace preserved
//! - No floating-point tolerance

use tracing::debug;
use verdict_common::types::{AtomicCase, CaseResult, RawExecutionResult, TestCaseRecord};

fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Human-readable description of a runtime failure, empty if there was none
pub fn runtime_error_message(raw: &RawExecutionResult) -> String {
    let stderr = raw.stderr.trim();
    if !stderr.is_empty() {
        stderr.to_string()
    } else if raw.exit_code != 0 {
        format!("Process exited with code {}", raw.exit_code)
    } else {
        String::new()
    }
}

fn graded(
    case: &AtomicCase,
    actual: &str,
    passed: bool,
    error: String,
    raw: &RawExecutionResult,
    is_submission: bool,
) -> CaseResult {
    CaseResult {
        atomic_id: case.atomic_id.clone(),
        origin_id: case.origin_id.clone(),
        ordinal: case.ordinal,
        hidden: case.hidden,
        passed,
        input: case.input.clone(),
        actual_output: actual.to_string(),
        expected_output: normalize_output(&case.expected_output).to_string(),
        error,
        time_ms: raw.time_ms,
        memory_kb: raw.memory_kb.unwrap_or(0),
        is_submission,
    }
}

/// Grade the atomic cases of one record against the backend's result for it
pub fn reconcile(
    record: &TestCaseRecord,
    cases: &[AtomicCase],
    raw: &RawExecutionResult,
    is_submission: bool,
) -> Vec<CaseResult> {
    let stdout = normalize_output(&raw.stdout);

    if let [case] = cases {
        let expected = normalize_output(&case.expected_output);
        let passed = stdout == expected && raw.stderr.is_empty() && raw.exit_code == 0;

        debug!(record_id = %record.id, passed = passed, "Reconciled single case");
        return vec![graded(case, stdout, passed, runtime_error_message(raw), raw, is_submission)];
    }

    let lines: Vec<&str> = stdout.lines().collect();
    if lines.len() < cases.len() {
        debug!(
            record_id = %record.id,
            cases = cases.len(),
            lines = lines.len(),
            "Combined output is shorter than the case list"
        );
    }

    cases
        .iter()
        .enumerate()
        .map(|(idx, case)| {
            let actual = lines.get(idx).map(|l| normalize_output(l)).unwrap_or("");
            let passed = actual == normalize_output(&case.expected_output);
            graded(case, actual, passed, String::new(), raw, is_submission)
        })
        .collect()
}
