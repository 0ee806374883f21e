//! Error types for the prober

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProberError>;

#[derive(Debug, Error)]
pub enum ProberError {
    /// Rejected user input (empty URL, zero interval)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced target does not exist
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// State store could not be read or written
    #[error("State store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A spawned probe task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ProberError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ProberError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ProberError::Validation(_))
    }
}
