//! Error types for mos-rater
//!
//! Every handler error becomes `{"error": {"code", "message", "retryable"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - session complete or stale form
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Service cannot run with the current setup (503)
    #[error("{0}")]
    Configuration(String),

    /// Rating store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<mos_common::Error> for ApiError {
    fn from(err: mos_common::Error) -> Self {
        if err.is_configuration() {
            return ApiError::Configuration(err.to_string());
        }
        match err {
            mos_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, bool) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", false),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", false),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT", false),
            ApiError::Configuration(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CONFIGURATION_ERROR",
                false,
            ),
            ApiError::Store(StoreError::Transient(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE", true)
            }
            ApiError::Store(StoreError::Configuration(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_MISCONFIGURED",
                false,
            ),
            ApiError::Store(StoreError::Malformed(_)) => {
                (StatusCode::BAD_GATEWAY, "STORE_MALFORMED", true)
            }
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                false,
            ),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }

    pub fn is_retryable(&self) -> bool {
        self.parts().2
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, retryable) = self.parts();
        if status.is_server_error() {
            tracing::warn!("{} ({})", self, error_code);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
                "retryable": retryable,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
