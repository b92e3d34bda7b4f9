//! API error types and JSON error response formatting.
//!
//! ApiError gives every endpoint the same `{error, message}` body and maps
//! the engine's error taxonomy onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use typist_core::error::TypistError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "conflict").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - no such session or profile.
    NotFound(String),
    /// 409 Conflict - a session is busy or in the wrong state.
    Conflict(String),
    /// 422 Unprocessable Entity - value out of range or unusable measurement.
    UnprocessableEntity(String),
    /// 502 Bad Gateway - the text provider failed.
    BadGateway(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity", msg)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<TypistError> for ApiError {
    fn from(err: TypistError) -> Self {
        let message = err.to_string();
        match err {
            TypistError::Validation(_) => ApiError::BadRequest(message),
            TypistError::NotFound(_) => ApiError::NotFound(message),
            TypistError::Busy(_) | TypistError::InvalidState { .. } => ApiError::Conflict(message),
            TypistError::OutOfRange(_) | TypistError::InvalidMeasurement(_) => {
                ApiError::UnprocessableEntity(message)
            }
            TypistError::Provider(_) => ApiError::BadGateway(message),
            _ => {
                tracing::error!("Internal error: {}", message);
                ApiError::Internal(message)
            }
        }
    }
}
