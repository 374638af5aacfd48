//! Unified error types for Ixen

use thiserror::Error;

/// Unified error type for all Ixen operations
#[derive(Error, Debug)]
pub enum IxenError {
    // Request errors
    #[error("{0}")]
    Validation(String),

    // Upstream errors
    #[error("{0}")]
    NotLive(String),

    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Browser error: {0}")]
    Browser(String),

    // Classification errors
    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("API limit: {0}")]
    ApiLimit(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    // Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl IxenError {
    /// Stable snake-case code, sent as the `error` field of `error` frames
    pub fn kind(&self) -> &'static str {
        match self {
            IxenError::Validation(_) => "validation",
            IxenError::NotLive(_) => "not_live",
            IxenError::Setup(_) => "setup",
            IxenError::Transport(_) => "transport",
            IxenError::Browser(_) => "browser",
            IxenError::Classification(_) => "classification",
            IxenError::Api(_) => "api",
            IxenError::ApiLimit(_) => "api_limit",
            IxenError::Auth(_) => "auth",
            IxenError::Config(_) => "config",
            IxenError::Io(_) => "io",
            IxenError::Serialization(_) => "serialization",
            IxenError::Other(_) => "other",
        }
    }
}

/// Result type alias using IxenError
pub type Result<T> = std::result::Result<T, IxenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(IxenError::NotLive("x".into()).kind(), "not_live");
        assert_eq!(IxenError::Setup("x".into()).kind(), "setup");
        assert_eq!(IxenError::Transport("x".into()).kind(), "transport");
    }

    #[test]
    fn test_validation_message_is_bare() {
        let err = IxenError::Validation("Username is required".into());
        assert_eq!(err.to_string(), "Username is required");
    }
}
