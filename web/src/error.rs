//! Error types for flow handlers.
//!
//! Bridges engine failures into HTTP responses. Validation failures, unknown
//! step names and stale client state never reach this module: the engine
//! reports those as failed form responses or redirects.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use waypoint_core::FlowError;

/// Application error type for flow handlers.
///
/// Implements Axum's `IntoResponse`; server errors are logged with their
/// source before the JSON body is produced.
///
/// # Examples
///
/// ```
/// use waypoint_web::AppError;
/// use axum::http::StatusCode;
///
/// let err = AppError::unauthorized("Missing session");
/// assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
/// assert_eq!(err.to_string(), "[UNAUTHORIZED] Missing session");
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "BAD_REQUEST".to_string())
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message.into(), "UNAUTHORIZED".to_string())
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 502 Bad Gateway error, used when step business logic fails.
    #[must_use]
    pub fn step_failed(step: &str) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            format!("Step {step} could not be completed"),
            "STEP_FAILED".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Client-facing error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = ?source,
                    "Flow request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Flow request failed"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        let base = match &err {
            FlowError::Step { step, .. } => Self::step_failed(step),
            FlowError::SessionStore(_) => Self::unavailable("Session storage is unavailable"),
            FlowError::DuplicateStep(_) | FlowError::Serialization(_) => {
                Self::internal("An internal error occurred")
            }
        };
        base.with_source(err.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failure_maps_to_bad_gateway() {
        let err = AppError::from(FlowError::Step {
            step: "document_capture".into(),
            source: anyhow::anyhow!("vendor timeout"),
        });

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "STEP_FAILED");
        assert_eq!(err.to_string(), "[STEP_FAILED] Step document_capture could not be completed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_store_failure_maps_to_unavailable() {
        let err = AppError::from(FlowError::SessionStore("connection refused".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_into_response_hides_source() {
        let response = AppError::internal("An internal error occurred")
            .with_source(anyhow::anyhow!("secret detail"))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
