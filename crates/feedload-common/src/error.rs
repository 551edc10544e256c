//! Error types shared across feedload crates

use thiserror::Error;

/// Result type alias for shared feedload operations
pub type Result<T> = std::result::Result<T, FeedloadError>;

/// Errors raised by the shared infrastructure (environment, logging)
#[derive(Error, Debug)]
pub enum FeedloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidEnv {
        key: String,
        value: String,
        reason: String,
    },
}

impl FeedloadError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
