//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use mos_common::config::SummaryMode;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Rating store in use
    pub backend: String,
    pub summary_mode: SummaryMode,
    pub active_sessions: usize,
    pub uptime_seconds: i64,
}

/// GET /health
///
/// Does not touch the store, so it stays fast when a remote backend is down.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "mos-rater".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: orchestrator.store().backend_name().to_string(),
        summary_mode: orchestrator.summary_mode(),
        active_sessions: orchestrator.sessions().len().await,
        uptime_seconds: (chrono::Utc::now() - state.startup_time).num_seconds(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
