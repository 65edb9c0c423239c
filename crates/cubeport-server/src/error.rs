//! Server-specific error types

use crate::api::response::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cubeport_pipeline::{PersistenceError, PipelineError, SubmissionError};
use thiserror::Error;

/// Result type alias for handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors returned by API handlers
#[derive(Error, Debug)]
pub enum ApiError {
    /// A single request failed after it was persisted
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// The pending store could not be read at all
    #[error(transparent)]
    Backlog(#[from] PersistenceError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// HTTP status for this error.
    ///
    /// Rejections by the optimization service keep their status. Upstream
    /// failures (5xx, timeouts, unreachable) become 502; local failures 500.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Submission(e) => match &e.source {
                PipelineError::Remote(remote) => remote
                    .status()
                    .filter(|_| remote.is_client_error())
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Backlog(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Submission(e) => match &e.source {
                PipelineError::Remote(remote) if remote.is_client_error() => "optimization_rejected",
                PipelineError::Remote(_) => "upstream_failure",
                other => other.kind(),
            },
            ApiError::Backlog(_) => "store_unavailable",
            ApiError::BadRequest(_) => "bad_request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match self {
            ApiError::Submission(e) => {
                tracing::error!(
                    request_id = %e.request_id,
                    timestamp = %e.timestamp,
                    status = status.as_u16(),
                    "Request failed: {}",
                    e.source
                );
                let message = match &e.source {
                    PipelineError::Remote(remote) => remote.message(),
                    other => other.to_string(),
                };
                ErrorResponse::for_request(code, message, e.request_id, e.timestamp)
            }
            ApiError::Backlog(e) => {
                tracing::error!("Pending store unavailable: {}", e);
                ErrorResponse::new(code, e.to_string())
            }
            ApiError::BadRequest(message) => ErrorResponse::new(code, message),
        };

        (status, Json(body)).into_response()
    }
}
