//! HTTP error mapping.

use crate::types::ErrorBody;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use kiln_core::ExecError;
use thiserror::Error;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was rejected before any work was done.
    #[error("{0}")]
    BadRequest(String),

    /// The body could not be decoded into a request.
    ///
    /// Carries axum's status: 400 for invalid JSON, 422 for a body of the
    /// wrong shape, 415 for a missing JSON content type, 413 when too large.
    #[error("{detail}")]
    InvalidBody { status: StatusCode, detail: String },

    /// Something escaped the executor that should have been downgraded.
    #[error("{0}")]
    Internal(String),
}

impl From<ExecError> for ApiError {
    fn from(err: ExecError) -> Self {
        if err.is_rejection() {
            Self::BadRequest(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidBody { status, .. } => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
