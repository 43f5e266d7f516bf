//! Centralized API error handling
//!
//! This module provides a unified error type for API responses with proper
//! HTTP status code mapping and JSON error responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::{AuthError, ErrorKind};

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failure raised by the authentication core
    #[error("{0}")]
    Auth(AuthError),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::TooManyRequests => "TOO_MANY_REQUESTS",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Auth(err) => err.code(),
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(err) => match err.kind() {
                ErrorKind::InputValidation | ErrorKind::ProtocolState => StatusCode::BAD_REQUEST,
                ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Infrastructure => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message safe to show callers. Server-side failures never expose
    /// their underlying cause.
    fn public_message(&self) -> String {
        match self {
            ApiError::Auth(AuthError::Store(_)) => {
                "Service temporarily unavailable, please retry".to_string()
            }
            ApiError::Auth(AuthError::Internal(_)) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Log server errors with full detail
        if status.is_server_error() {
            tracing::error!(error = ?self, code = %error_code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = %error_code, "Client error occurred");
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message: self.public_message(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}
