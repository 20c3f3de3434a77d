//! CSV downloads

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use mos_common::export::{self, RATINGS_FILE_NAME, SUMMARY_FILE_NAME};

use crate::{ApiResult, AppState};

fn csv_attachment(file_name: &str, bytes: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", file_name);
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

/// GET /api/export/summary.csv
pub async fn export_summary(State(state): State<AppState>) -> ApiResult<Response> {
    let rows = state.orchestrator.summary().await?;
    let bytes = export::summary_csv(&rows)?;
    Ok(csv_attachment(SUMMARY_FILE_NAME, bytes))
}

/// GET /api/export/ratings.csv
pub async fn export_ratings(State(state): State<AppState>) -> ApiResult<Response> {
    let records = state.orchestrator.ratings().await?;
    let bytes = export::ratings_csv(&records)?;
    Ok(csv_attachment(RATINGS_FILE_NAME, bytes))
}

pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/api/export/summary.csv", get(export_summary))
        .route("/api/export/ratings.csv", get(export_ratings))
}
