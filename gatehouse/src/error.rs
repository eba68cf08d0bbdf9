//! Error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the gate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Configuration loaded but failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Ban/approval store could not be read or written
    #[error("Store error: {0}")]
    Store(String),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External service error (502)
    #[error("External service error: {0}")]
    External(String),

    /// An outbound call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Page template failed to render
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status code
    pub status: u16,

    /// Local time of the fault, set on internal errors only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            status: status.as_u16(),
            timestamp: None,
        }
    }

    /// Create error response with a code
    pub fn with_code(
        status: StatusCode,
        code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
            timestamp: None,
        }
    }

    /// Generic 500 body; the real cause goes to the fault log, never the client
    pub fn internal() -> Self {
        Self {
            error: "Internal Server Error".to_string(),
            code: Some("INTERNAL_ERROR".to_string()),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            timestamp: Some(crate::fault::fault_timestamp()),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Error::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::with_code(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ),

            Error::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::with_code(StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ),

            Error::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::with_code(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ),

            Error::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorResponse::with_code(StatusCode::CONFLICT, "CONFLICT", msg),
            ),

            Error::External(msg) => {
                tracing::error!("External service error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse::with_code(
                        StatusCode::BAD_GATEWAY,
                        "EXTERNAL_ERROR",
                        "External service unavailable",
                    ),
                )
            }

            Error::Timeout(msg) => {
                tracing::warn!("Outbound call timed out: {}", msg);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    ErrorResponse::with_code(
                        StatusCode::GATEWAY_TIMEOUT,
                        "TIMEOUT",
                        "Upstream request timed out",
                    ),
                )
            }

            // Everything else is a fault: log the cause, answer generically
            other => {
                let message = other.to_string();
                tracing::error!("Internal error: {}", message);
                let mut response = (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::internal()),
                )
                    .into_response();
                response
                    .extensions_mut()
                    .insert(crate::fault::FaultDetail(message));
                return response;
            }
        };

        (status, Json(error_response)).into_response()
    }
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<tower_sessions::session::Error> for Error {
    fn from(err: tower_sessions::session::Error) -> Self {
        Error::Session(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_maps_to_401() {
        let response = Error::Unauthorized("bad code".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.extensions().get::<crate::fault::FaultDetail>().is_none());
    }

    #[test]
    fn test_internal_errors_carry_fault_detail() {
        let response = Error::Store("disk full".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response
            .extensions()
            .get::<crate::fault::FaultDetail>()
            .expect("fault detail attached");
        assert!(detail.0.contains("disk full"));
    }

    #[test]
    fn test_template_errors_are_internal() {
        let response = Error::from(askama::Error::Fmt).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<crate::fault::FaultDetail>().is_some());
    }

    #[test]
    fn test_error_response_skips_empty_fields() {
        let body = ErrorResponse::new(StatusCode::NOT_FOUND, "missing");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], 404);
        assert!(json.get("code").is_none());
        assert!(json.get("timestamp").is_none());
    }
}
