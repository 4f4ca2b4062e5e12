//! Error types and result aliases for the Nebuly SDK.
//!
//! Capture-side operations never fail: unmatched or gated notifications are
//! dropped silently. Only the terminal send operations return
//! [`Result<T>`], with [`NebulyError`] describing what went wrong.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NebulyError {
    #[error("No API key provided")]
    MissingApiKey,

    #[error("API error: {status} - {body}")]
    ApiError { status: u16, body: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, NebulyError>;
