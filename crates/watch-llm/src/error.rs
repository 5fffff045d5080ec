//! Error types for LLM operations

use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur while talking to a completion provider
#[derive(Error, Debug)]
pub enum LLMError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The provider answered without any text
    #[error("Empty completion from {0}")]
    EmptyCompletion(String),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// Whether retrying the same request later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded(_) | Self::HttpError(_) | Self::RequestFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LLMError::EmptyCompletion("openai".to_string());
        assert_eq!(err.to_string(), "Empty completion from openai");

        let err = LLMError::ModelNotFound("gpt-x".to_string());
        assert_eq!(err.to_string(), "Model not found: gpt-x");
    }

    #[test]
    fn test_transient_classification() {
        assert!(LLMError::RateLimitExceeded("slow down".to_string()).is_transient());
        assert!(!LLMError::AuthenticationFailed.is_transient());
        assert!(!LLMError::InvalidRequest("bad".to_string()).is_transient());
    }
}
