//! Error types for the moderation live event client

/// Errors that can occur while talking to the moderation server
#[derive(Debug, thiserror::Error)]
pub enum LiveClientError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Missing field '{field}' in '{event}' event")]
    MissingField { event: String, field: &'static str },

    #[error("Reconnection failed after {0} attempts")]
    RetriesExhausted(u32),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LiveClientError>;
