//! Error types for allow-list synchronization
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for allowsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for allowsync
#[derive(Error, Debug)]
pub enum Error {
    /// A hostname did not resolve, or resolved to nothing
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Auth, transport or API error from the remote allow-list
    #[error("Provider unavailable ({provider}): {message}")]
    ProviderUnavailable {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Malformed input from a caller (e.g. a candidate address)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown provider type requested
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Durable cache could not be read or written
    ///
    /// Never fatal: callers log it and carry on.
    #[error("Persistence warning: {0}")]
    Persistence(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a provider error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an unsupported provider error
    pub fn unsupported_provider(name: impl Into<String>) -> Self {
        Self::UnsupportedProvider(name.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error was raised before any remote call could happen
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::UnsupportedProvider(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_names_the_provider() {
        let err = Error::provider("cloudflare", "Rate limit exceeded");
        assert_eq!(
            err.to_string(),
            "Provider unavailable (cloudflare): Rate limit exceeded"
        );
    }

    #[test]
    fn unsupported_provider_message() {
        let err = Error::unsupported_provider("Azure");
        assert_eq!(err.to_string(), "unsupported provider: Azure");
        assert!(err.is_caller_error());
        assert!(!Error::resolution("x").is_caller_error());
    }
}
