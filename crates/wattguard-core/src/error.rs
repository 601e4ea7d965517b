//! Error types for WattGuard

use thiserror::Error;

/// Result type alias using WattGuard's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for WattGuard operations
///
/// Fetch and parse failures never surface here; the monitor loop recovers
/// them locally through [`crate::fetch::FetchOutcome`] and
/// [`crate::parser::ParseOutcome`].
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration source could not be read or merged
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Email transport or message error
    #[error("Email error: {0}")]
    Email(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an email error
    pub fn email(msg: impl Into<String>) -> Self {
        Self::Email(msg.into())
    }
}
