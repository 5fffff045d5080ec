//! Error types for instrument-watch operations

use thiserror::Error;

/// Errors raised by providers, the news aggregator and the analysis generator
///
/// The coordinator absorbs almost all of these: fetch failures turn into
/// unavailable sections and generation failures into log lines. Only
/// [`WatchError::InvalidSymbol`] reaches callers of `get_or_create`.
#[derive(Debug, Error)]
pub enum WatchError {
    /// API request failed
    #[error("API error: {0}")]
    ApiError(String),

    /// Ticker could not be normalised
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable {
        symbol: String,
        reason: String,
    },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded {
        provider: String,
    },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Technical indicator calculation error
    #[error("Technical indicator error: {0}")]
    IndicatorError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Prompt template failed to render
    #[error("Prompt error: {0}")]
    PromptError(String),

    /// Text generation failed
    #[error("LLM error: {0}")]
    LlmError(#[from] watch_llm::LLMError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for instrument-watch operations
pub type Result<T> = std::result::Result<T, WatchError>;

impl From<minijinja::Error> for WatchError {
    fn from(err: minijinja::Error) -> Self {
        WatchError::PromptError(err.to_string())
    }
}

impl From<anyhow::Error> for WatchError {
    fn from(err: anyhow::Error) -> Self {
        WatchError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WatchError::InvalidSymbol("A B".to_string());
        assert_eq!(err.to_string(), "Invalid symbol: A B");

        let err = WatchError::DataUnavailable {
            symbol: "SPY".to_string(),
            reason: "no option expirations".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Data not available for SPY: no option expirations"
        );
    }

    #[test]
    fn test_llm_error_conversion() {
        let err: WatchError = watch_llm::LLMError::AuthenticationFailed.into();
        assert!(matches!(err, WatchError::LlmError(_)));
        assert!(err.to_string().starts_with("LLM error"));
    }
}
