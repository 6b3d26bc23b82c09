//! Error types for the gateway.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use eternal_core::registry::RegistryError;

/// Errors that can occur in the gateway layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested run does not exist or has terminated.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request is missing a path segment or carries a malformed body.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A run with the requested id is already active.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RegistryError> for ObserverError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) | RegistryError::Gone(_) => Self::NotFound(err.to_string()),
            RegistryError::AlreadyRunning(_) => Self::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
