//! Error types for labeldeck-gate
//!
//! [`GateError`] is what core operations surface: only a missing baseline,
//! a denial, or bad input cross the core boundary. Everything else degrades
//! inside the orchestrator. [`ApiError`] maps both onto HTTP responses.

use crate::access::AccessError;
use crate::rate_limit::LimiterError;
use crate::votes::VoteError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Hard failures of core operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Forbidden(#[from] AccessError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<VoteError> for GateError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::SubjectNotFound(id) => GateError::NotFound(id),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed principal headers (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Access denied (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// labeldeck-common error
    #[error("Common error: {0}")]
    Common(#[from] labeldeck_common::Error),
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::NotFound(msg) => ApiError::NotFound(msg),
            GateError::Forbidden(access) => ApiError::Forbidden(access.to_string()),
            GateError::InvalidInput(msg) => ApiError::BadRequest(msg),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

impl From<VoteError> for ApiError {
    fn from(err: VoteError) -> Self {
        GateError::from(err).into()
    }
}

impl From<LimiterError> for ApiError {
    fn from(err: LimiterError) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
