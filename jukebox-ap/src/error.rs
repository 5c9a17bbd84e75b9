//! Error types for jukebox-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Main error type for jukebox-ap module
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors surfaced from jukebox-common (config loading, serialization)
    #[error(transparent)]
    Common(#[from] jukebox_common::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Track search or stream URL resolution failed
    #[error("Resolve error: {0}")]
    Resolve(String),

    /// Resolution attempt exceeded its time budget
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// No live player process to command
    #[error("Player unavailable: {0}")]
    PlayerUnavailable(String),

    /// Player rejected or could not receive a command
    #[error("Player command failed: {0}")]
    PlayerCommand(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using jukebox-ap Error
pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::PlayerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::BadRequest(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Client-facing text without the variant prefix
        let message = match self {
            Error::NotFound(msg)
            | Error::PlayerUnavailable(msg)
            | Error::BadRequest(msg)
            | Error::Config(msg) => msg,
            other => other.to_string(),
        };

        let body = Json(json!({
            "status": "error",
            "message": &message,
            "detail": &message,
        }));

        (status, body).into_response()
    }
}
