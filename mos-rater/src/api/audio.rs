//! Audio playback endpoint
//!
//! Only names present in the current catalog listing are served, so path
//! segments such as `..` never reach the file system.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use mos_common::catalog;

use crate::{ApiResult, AppState};

/// GET /api/audio/:file
pub async fn get_audio(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let bytes = state.orchestrator.read_audio(&file).await?;
    Ok((
        [
            (header::CONTENT_TYPE, catalog::content_type(&file)),
            (header::CACHE_CONTROL, "no-store"),
        ],
        bytes,
    ))
}

pub fn audio_routes() -> Router<AppState> {
    Router::new().route("/api/audio/:file", get(get_audio))
}
