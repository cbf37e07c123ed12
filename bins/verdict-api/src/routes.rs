// Route table for the Verdict API

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions/:id/run", post(handlers::run_pass))
        .route("/sessions/:id/submit", post(handlers::submit_pass))
        .route("/sessions/:id/restore", post(handlers::restore_submission))
        .route("/sessions/:id/results", get(handlers::get_results))
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
}
