// Prometheus metrics for grading passes

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;
use tracing::warn;
use verdict_engine::orchestrator::PassReport;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    /// Passes by mode and outcome ("completed", "compile_failed", ...)
    pub static ref PASSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("verdict_passes_total", "Grading passes by mode and outcome"),
        &["mode", "outcome"],
    )
    .expect("Failed to create counter");

    pub static ref CASES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("verdict_cases_total", "Graded atomic cases by mode and result"),
        &["mode", "result"],
    )
    .expect("Failed to create counter");

    pub static ref PASS_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("verdict_pass_duration_seconds", "Wall time of a grading pass")
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["mode"],
    )
    .expect("Failed to create histogram");
}

/// Register all metrics with the registry. Safe to call more than once.
/// Returns how many collectors failed for a reason other than being registered already.
pub fn init_metrics() -> usize {
    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(PASSES_TOTAL.clone()),
        Box::new(CASES_TOTAL.clone()),
        Box::new(PASS_DURATION.clone()),
    ];
    register_all(&REGISTRY, collectors)
}

fn register_all(registry: &Registry, collectors: Vec<Box<dyn Collector>>) -> usize {
    let mut failures = 0;
    for collector in collectors {
        match registry.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => {
                warn!(error = %e, "Failed to register metric");
                failures += 1;
            }
        }
    }
    failures
}

pub fn record_pass(report: &PassReport, elapsed: Duration) {
    let mode = report.mode.to_string();
    let mode = mode.as_str();

    PASSES_TOTAL
        .with_label_values(&[mode, report.outcome.as_str()])
        .inc();

    let passed = report.summary.passed_count as u64;
    let failed = (report.summary.total_count - report.summary.passed_count) as u64;
    CASES_TOTAL.with_label_values(&[mode, "passed"]).inc_by(passed);
    CASES_TOTAL.with_label_values(&[mode, "failed"]).inc_by(failed);

    PASS_DURATION
        .with_label_values(&[mode])
        .observe(elapsed.as_secs_f64());
}

/// Render the registry in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
