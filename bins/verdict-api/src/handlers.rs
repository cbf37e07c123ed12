// HTTP route handlers for the Verdict API

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;
use verdict_common::types::{Language, Mode, TestCaseRecord};
use verdict_engine::aggregator::summarize_by_mode;
use verdict_engine::orchestrator::PassReport;
use verdict_engine::region::RegionCodec;

use crate::metrics;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PassRequest {
    pub language: Language,
    /// Complete program source. Takes precedence over `boilerplate`/`solution`.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub boilerplate: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    pub test_cases: Vec<TestCaseRecord>,
}

impl PassRequest {
    /// The program to grade: `code` as given, or the solution merged into
    /// the boilerplate's solution region.
    pub fn source(&self, codec: &dyn RegionCodec) -> Option<String> {
        if let Some(code) = &self.code {
            return Some(code.clone());
        }
        match (&self.boilerplate, &self.solution) {
            (Some(boilerplate), Some(solution)) => {
                Some(codec.merge_region(boilerplate, solution, self.language))
            }
            (Some(boilerplate), None) => Some(boilerplate.clone()),
            (None, Some(solution)) => Some(solution.clone()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PassResponse {
    pub pass_id: String,
    /// Submit passes only: every case passed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    #[serde(flatten)]
    pub report: PassReport,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

async fn grade(state: Arc<AppState>, session_id: String, payload: PassRequest, mode: Mode) -> Response {
    let Some(code) = payload.source(&state.codec) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Request must carry either code or boilerplate/solution",
        );
    };

    let pass_id = Uuid::new_v4();
    let session = state.session(&session_id).await;
    let started = Instant::now();

    info!(
        pass_id = %pass_id,
        session_id = %session_id,
        language = %payload.language,
        mode = %mode,
        test_cases = payload.test_cases.len(),
        "Pass started"
    );

    let report = match mode {
        Mode::Run => session.run(&code, payload.language, &payload.test_cases).await,
        Mode::Submit => session.submit(&code, payload.language, &payload.test_cases).await,
    };

    let Some(report) = report else {
        warn!(pass_id = %pass_id, session_id = %session_id, "Pass superseded by a newer invocation");
        return error_response(StatusCode::CONFLICT, "Superseded by a newer run or submission");
    };

    metrics::record_pass(&report, started.elapsed());
    info!(
        pass_id = %pass_id,
        outcome = report.outcome.as_str(),
        passed = report.summary.passed_count,
        total = report.summary.total_count,
        "Pass published"
    );

    let accepted = (mode == Mode::Submit).then(|| report.all_passed());
    (
        StatusCode::OK,
        Json(PassResponse {
            pass_id: pass_id.to_string(),
            accepted,
            report,
        }),
    )
        .into_response()
}

/// POST /sessions/:id/run - Grade against the visible cases
pub async fn run_pass(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<PassRequest>,
) -> Response {
    grade(state, session_id, payload, Mode::Run).await
}

/// POST /sessions/:id/submit - Grade against the hidden cases and snapshot the result
pub async fn submit_pass(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<PassRequest>,
) -> Response {
    grade(state, session_id, payload, Mode::Submit).await
}

/// POST /sessions/:id/restore - Consume the pending submission snapshot, if any
pub async fn restore_submission(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    let session = state.session(&session_id).await;
    let restored = session.restore().await;

    info!(session_id = %session_id, restored = restored.is_some(), "Restore requested");
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "restored": restored,
            "state": session.state(),
        })),
    )
        .into_response()
}

/// GET /sessions/:id/results - Current run and submission results
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = state.existing_session(&session_id).await else {
        return error_response(StatusCode::NOT_FOUND, format!("Unknown session: {}", session_id));
    };

    let view = session.results().await;
    let all_results: Vec<_> = view
        .run
        .iter()
        .chain(view.submission.iter())
        .flat_map(|report| report.results.iter().cloned())
        .collect();
    let summaries = summarize_by_mode(&all_results);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "state": session.state(),
            "run": view.run,
            "submission": view.submission,
            "summaries": {
                "run": summaries.run,
                "submission": summaries.submission,
            },
        })),
    )
        .into_response()
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_endpoint() -> Response {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_engine::region::MarkerRegionCodec;

    fn request(json: serde_json::Value) -> PassRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_code_takes_precedence() {
        let req = request(serde_json::json!({
            "language": "python",
            "code": "print(1)",
            "boilerplate": "# SOLUTION START\n# SOLUTION END\n",
            "solution": "x = 2",
            "test_cases": []
        }));

        assert_eq!(req.source(&MarkerRegionCodec).as_deref(), Some("print(1)"));
    }

    #[test]
    fn test_solution_is_merged_into_boilerplate() {
        let req = request(serde_json::json!({
            "language": "python",
            "boilerplate": "# SOLUTION START\npass\n# SOLUTION END\nprint(solve())\n",
            "solution": "def solve():\n    return 3",
            "test_cases": [{ "id": "t1", "input": "", "output": "3", "hidden": true }]
        }));

        assert_eq!(
            req.source(&MarkerRegionCodec).as_deref(),
            Some("# SOLUTION START\ndef solve():\n    return 3\n# SOLUTION END\nprint(solve())\n")
        );
        assert!(req.test_cases[0].hidden);
    }

    #[test]
    fn test_missing_source_is_rejected() {
        let req = request(serde_json::json!({ "language": "c", "test_cases": [] }));
        assert!(req.source(&MarkerRegionCodec).is_none());
    }
}
