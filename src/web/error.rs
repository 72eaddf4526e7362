//! JSON error responses for the HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::error;
use ts_rs::TS;

use crate::services::MatchingError;

/// Stable, machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ApiErrorCode {
    NotFound,
    Conflict,
    BadRequest,
    InvalidSettings,
    Unavailable,
    InternalError,
}

impl ApiErrorCode {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::BadRequest | Self::InvalidSettings => StatusCode::BAD_REQUEST,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Conflict, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::BadRequest, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InternalError, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Log a store failure with context and hide its details from the client.
pub fn db_error(context: &str, error: impl std::fmt::Debug) -> ApiError {
    error!(error = ?error, "{context} failed");
    ApiError::internal_error(format!("{context} failed"))
}

impl From<MatchingError> for ApiError {
    fn from(err: MatchingError) -> Self {
        match err {
            MatchingError::Validation(message) => Self::bad_request(message),
            MatchingError::NotFound(what) => Self::not_found(format!("{what} not found")),
            MatchingError::Conflict(message) => Self::conflict(message),
            MatchingError::Cancelled => {
                Self::new(ApiErrorCode::Unavailable, "server is shutting down")
            }
            MatchingError::DataFetch(e) => db_error("load matching data", e),
            MatchingError::Persistence(e) => db_error("save matching data", e),
            MatchingError::Compute(e) => db_error("matching computation", e),
        }
    }
}
