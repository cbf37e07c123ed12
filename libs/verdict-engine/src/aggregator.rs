//! Aggregator - summary statistics over graded cases.

use verdict_common::types::{CaseResult, ResultSummary};

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Summarize one result set.
///
/// Time is averaged over the cases that have a measurement; memory over the
/// cases that report a non-zero figure. An empty list yields all zeros.
pub fn summarize(results: &[CaseResult]) -> ResultSummary {
    ResultSummary {
        passed_count: results.iter().filter(|r| r.passed).count(),
        total_count: results.len(),
        avg_time_ms: mean(results.iter().filter_map(|r| r.time_ms)),
        avg_memory_kb: mean(results.iter().filter(|r| r.memory_kb > 0).map(|r| r.memory_kb as f64)),
        failed_ordinals: results
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.passed)
            .map(|(idx, _)| idx + 1)
            .collect(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeSummaries {
    pub run: ResultSummary,
    pub submission: ResultSummary,
}

/// Summarize run and submission results separately from a mixed list
pub fn summarize_by_mode(results: &[CaseResult]) -> ModeSummaries {
    let (submission, run): (Vec<CaseResult>, Vec<CaseResult>) =
        results.iter().cloned().partition(|r| r.is_submission);

    ModeSummaries {
        run: summarize(&run),
        submission: summarize(&submission),
    }
}
