//! HTTP error responses.
//!
//! Every failure leaves the server as `{"code", "message"}` with a status
//! derived from the [`PortcullisError`] category. Infrastructure details
//! are logged and replaced by a generic message.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use portcullis_core::error::PortcullisError;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// 400 for bodies that could not be bound.
pub fn api_validation_error(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

/// 404 so a disabled surface is indistinguishable from a missing one.
pub fn api_not_enabled(message: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not_enabled", message)
}

/// Unwrap a JSON body, reporting binding failures in the common shape.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|_| api_validation_error("Invalid inputs. Please check your inputs"))
}

impl From<PortcullisError> for ApiError {
    fn from(err: PortcullisError) -> Self {
        match err {
            PortcullisError::InvalidInput { message } => {
                ApiError::new(StatusCode::BAD_REQUEST, "validation_error", message)
            }
            PortcullisError::Unauthorized { .. } => {
                ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", "invalid API key")
            }
            e @ PortcullisError::NotFound { .. } => {
                ApiError::new(StatusCode::NOT_FOUND, "not_found", e.to_string())
            }
            e @ PortcullisError::AlreadyExists { .. } => {
                ApiError::new(StatusCode::CONFLICT, "already_exists", e.to_string())
            }
            PortcullisError::Infrastructure(detail) => {
                tracing::error!(error = %detail, "request failed on infrastructure");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal server error",
                )
            }
        }
    }
}
