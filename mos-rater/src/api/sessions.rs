//! Rating session endpoints
//!
//! A session walks the catalog in order. The client submits the file it was
//! shown together with a score; the server rejects anything but the file the
//! session is waiting for.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use mos_common::ids::{self, SessionToken};
use mos_common::Score;
use serde::{Deserialize, Serialize};

use crate::session::SessionStatus;
use crate::{ApiError, ApiResult, AppState};

/// Score as a number (`4`) or as its form label (`"4: Good"`)
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RatingInput {
    Value(i64),
    Label(String),
}

impl TryFrom<RatingInput> for Score {
    type Error = ApiError;

    fn try_from(input: RatingInput) -> Result<Self, Self::Error> {
        match input {
            RatingInput::Value(v) => Score::try_from(v).map_err(ApiError::from),
            RatingInput::Label(label) => Score::from_label(&label)
                .or_else(|| label.trim().parse::<u8>().ok().and_then(Score::new))
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown rating '{}'", label))),
        }
    }
}

/// Request payload for a rating submission
#[derive(Debug, Deserialize)]
pub struct SubmitRatingRequest {
    /// File the client was shown
    pub audio_file: String,
    pub rating: RatingInput,
}

#[derive(Debug, Serialize)]
pub struct ScaleOption {
    pub value: u8,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ScaleResponse {
    pub options: Vec<ScaleOption>,
    pub default: u8,
}

fn parse_token(raw: &str) -> ApiResult<SessionToken> {
    ids::parse_session_token(raw)
        .map_err(|_| ApiError::BadRequest(format!("Invalid session token '{}'", raw)))
}

/// GET /api/scale
pub async fn get_scale() -> Json<ScaleResponse> {
    Json(ScaleResponse {
        options: Score::ALL
            .into_iter()
            .map(|s| ScaleOption {
                value: s.value(),
                label: s.label(),
            })
            .collect(),
        default: Score::DEFAULT.value(),
    })
}

/// POST /api/sessions
pub async fn start_session(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<SessionStatus>)> {
    let status = state.orchestrator.start_session().await?;
    Ok((StatusCode::CREATED, Json(status)))
}

/// GET /api/sessions/:token
pub async fn get_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<SessionStatus>> {
    let token = parse_token(&token)?;
    Ok(Json(state.orchestrator.session_status(&token).await?))
}

/// DELETE /api/sessions/:token
pub async fn end_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<StatusCode> {
    let token = parse_token(&token)?;
    state.orchestrator.end_session(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sessions/:token/ratings
///
/// **Request:** `{"audio_file": "a.wav", "rating": 4}`
///
/// **Errors:**
/// - 404: unknown session
/// - 409: session complete, or `audio_file` is not the current file
/// - 503/502: store write failed; the session did not advance
pub async fn submit_rating(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<SubmitRatingRequest>,
) -> ApiResult<Json<SessionStatus>> {
    let token = parse_token(&token)?;
    let score = Score::try_from(payload.rating)?;
    let status = state
        .orchestrator
        .submit(&token, &payload.audio_file, score)
        .await?;
    Ok(Json(status))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/scale", get(get_scale))
        .route("/api/sessions", post(start_session))
        .route("/api/sessions/:token", get(get_session).delete(end_session))
        .route("/api/sessions/:token/ratings", post(submit_rating))
}
