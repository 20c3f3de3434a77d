//! MOS summary and raw ratings as JSON

use axum::{extract::State, routing::get, Json, Router};
use mos_common::config::SummaryMode;
use mos_common::{MosSummary, RatingRecord};
use serde::Serialize;

use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary_mode: SummaryMode,
    pub rows: Vec<MosSummary>,
}

#[derive(Debug, Serialize)]
pub struct RatingsResponse {
    pub count: usize,
    pub ratings: Vec<RatingRecord>,
}

/// GET /api/summary
pub async fn get_summary(State(state): State<AppState>) -> ApiResult<Json<SummaryResponse>> {
    let rows = state.orchestrator.summary().await?;
    Ok(Json(SummaryResponse {
        summary_mode: state.orchestrator.summary_mode(),
        rows,
    }))
}

/// GET /api/ratings
///
/// Every stored rating, including rows the aggregator excludes.
pub async fn get_ratings(State(state): State<AppState>) -> ApiResult<Json<RatingsResponse>> {
    let ratings = state.orchestrator.ratings().await?;
    Ok(Json(RatingsResponse {
        count: ratings.len(),
        ratings,
    }))
}

pub fn summary_routes() -> Router<AppState> {
    Router::new()
        .route("/api/summary", get(get_summary))
        .route("/api/ratings", get(get_ratings))
}
