//! Error types for the digital twin service

use thiserror::Error;

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, TwinError>;

/// Errors raised by stores, retrievers, generators and the query pipeline
#[derive(Debug, Error)]
pub enum TwinError {
    /// Missing or invalid credentials / connection parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Fact store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Retriever unavailable: {0}")]
    RetrieverUnavailable(String),

    #[error("Generator unavailable: {0}")]
    GeneratorUnavailable(String),

    /// Backend-specific query failure (network, malformed response)
    #[error("Error querying facts: {0}")]
    Retrieval(String),

    /// Language model call failure
    #[error("Error generating response: {0}")]
    Generation(String),

    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(std::time::Duration, &'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TwinError {
    /// Whether the error belongs to the "service unavailable" category:
    /// a backend that never came up, or one that did not answer in time.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            TwinError::Configuration(_)
                | TwinError::StoreUnavailable(_)
                | TwinError::RetrieverUnavailable(_)
                | TwinError::GeneratorUnavailable(_)
                | TwinError::Timeout(..)
        )
    }

    /// Stable machine-readable code for API payloads
    pub fn code(&self) -> &'static str {
        match self {
            TwinError::Configuration(_) => "CONFIGURATION_ERROR",
            TwinError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            TwinError::RetrieverUnavailable(_) => "RETRIEVER_UNAVAILABLE",
            TwinError::GeneratorUnavailable(_) => "GENERATOR_UNAVAILABLE",
            TwinError::Retrieval(_) => "RETRIEVAL_ERROR",
            TwinError::Generation(_) => "GENERATION_ERROR",
            TwinError::Timeout(..) => "TIMEOUT",
            TwinError::InvalidRequest(_) => "VALIDATION_ERROR",
            TwinError::Serialization(_) => "SERIALIZATION_ERROR",
            TwinError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<redis::RedisError> for TwinError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_io_error() || e.is_timeout() {
            TwinError::StoreUnavailable(e.to_string())
        } else {
            TwinError::Retrieval(e.to_string())
        }
    }
}

impl From<config::ConfigError> for TwinError {
    fn from(e: config::ConfigError) -> Self {
        TwinError::Configuration(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unavailable_category() {
        assert!(TwinError::GeneratorUnavailable("no key".into()).is_unavailable());
        assert!(TwinError::Timeout(Duration::from_secs(1), "generation").is_unavailable());
        assert!(!TwinError::Retrieval("bad response".into()).is_unavailable());
        assert!(!TwinError::Generation("500".into()).is_unavailable());
    }

    #[test]
    fn test_messages_keep_original_detail() {
        let err = TwinError::Retrieval("connection reset".to_string());
        assert_eq!(err.to_string(), "Error querying facts: connection reset");
        assert_eq!(err.code(), "RETRIEVAL_ERROR");
    }
}
