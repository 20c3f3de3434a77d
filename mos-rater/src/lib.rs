//! mos-rater library - listening test service
//!
//! Serves the rating UI, records one score per audio file per session, and
//! reports the Mean Opinion Score of every file.

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod store;

pub use crate::error::{ApiError, ApiResult};
pub use crate::orchestrator::RatingOrchestrator;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RatingOrchestrator>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: RatingOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ui_routes())
        .merge(api::health_routes())
        .merge(api::session_routes())
        .merge(api::audio_routes())
        .merge(api::summary_routes())
        .merge(api::export_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
