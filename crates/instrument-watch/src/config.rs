//! Configuration for the cache and refresh coordinator

use crate::error::{Result, WatchError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for instrument-watch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Age after which a cached analysis is regenerated on the request path
    pub stale_threshold: Duration,

    /// Period of the per-ticker news refresh job
    pub news_refresh_interval: Duration,

    /// Period of the per-ticker sentiment refresh job
    pub sentiment_refresh_interval: Duration,

    /// Number of leading digest characters hashed into the change fingerprint
    pub fingerprint_window: usize,

    /// Articles requested from each news source
    pub news_limit_per_source: usize,

    /// Ask the LLM for an executive news summary
    pub summarize_news: bool,

    /// Request timeout for provider HTTP calls
    pub request_timeout: Duration,

    /// StockTwits requests per minute
    pub stocktwits_rate_limit: u32,

    /// Finnhub requests per minute (free tier: 60)
    pub finnhub_rate_limit: u32,

    /// Model id used for analysis and news summaries
    pub model: String,

    /// Completion budget for one analysis
    pub max_analysis_tokens: usize,

    /// Sampling temperature for analyses
    pub analysis_temperature: f32,

    /// Finnhub API key (optional; Finnhub news is skipped without it)
    pub finnhub_api_key: Option<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            stale_threshold: Duration::from_secs(3600),          // 1 hour
            news_refresh_interval: Duration::from_secs(30 * 60), // 30 minutes
            sentiment_refresh_interval: Duration::from_secs(15 * 60),
            fingerprint_window: 500,
            news_limit_per_source: 5,
            summarize_news: false,
            request_timeout: Duration::from_secs(30),
            stocktwits_rate_limit: 30,
            finnhub_rate_limit: 60,
            model: DEFAULT_MODEL.to_string(),
            max_analysis_tokens: 2048,
            analysis_temperature: 0.3,
            finnhub_api_key: None,
        }
    }
}

impl WatchConfig {
    /// Create a new configuration builder
    pub fn builder() -> WatchConfigBuilder {
        WatchConfigBuilder::default()
    }

    /// Load provider API keys from environment
    #[must_use]
    pub fn with_env_keys(mut self) -> Self {
        if let Some(key) = non_empty_env("FINNHUB_API_KEY") {
            self.finnhub_api_key = Some(key);
        }
        self
    }

    /// Load the model id from `WATCH_MODEL`
    #[must_use]
    pub fn from_env_model(mut self) -> Self {
        if let Some(model) = non_empty_env("WATCH_MODEL") {
            self.model = model;
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let zero_durations = [
            ("stale_threshold", self.stale_threshold),
            ("news_refresh_interval", self.news_refresh_interval),
            ("sentiment_refresh_interval", self.sentiment_refresh_interval),
            ("request_timeout", self.request_timeout),
        ];
        for (name, value) in zero_durations {
            if value.is_zero() {
                return Err(WatchError::ConfigError(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if self.fingerprint_window == 0 {
            return Err(WatchError::ConfigError(
                "fingerprint_window must be greater than 0".to_string(),
            ));
        }

        if self.stocktwits_rate_limit == 0 || self.finnhub_rate_limit == 0 {
            return Err(WatchError::ConfigError(
                "rate limits must be greater than 0".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(WatchError::ConfigError("model must not be empty".to_string()));
        }

        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Builder for WatchConfig
#[derive(Debug, Default)]
pub struct WatchConfigBuilder {
    stale_threshold: Option<Duration>,
    news_refresh_interval: Option<Duration>,
    sentiment_refresh_interval: Option<Duration>,
    fingerprint_window: Option<usize>,
    news_limit_per_source: Option<usize>,
    summarize_news: Option<bool>,
    request_timeout: Option<Duration>,
    stocktwits_rate_limit: Option<u32>,
    finnhub_rate_limit: Option<u32>,
    model: Option<String>,
    max_analysis_tokens: Option<usize>,
    analysis_temperature: Option<f32>,
    finnhub_api_key: Option<String>,
}

impl WatchConfigBuilder {
    /// Set the staleness threshold for cached analyses
    pub fn stale_threshold(mut self, duration: Duration) -> Self {
        self.stale_threshold = Some(duration);
        self
    }

    /// Set the news refresh period
    pub fn news_refresh_interval(mut self, duration: Duration) -> Self {
        self.news_refresh_interval = Some(duration);
        self
    }

    /// Set the sentiment refresh period
    pub fn sentiment_refresh_interval(mut self, duration: Duration) -> Self {
        self.sentiment_refresh_interval = Some(duration);
        self
    }

    /// Set the fingerprint window in characters
    pub fn fingerprint_window(mut self, chars: usize) -> Self {
        self.fingerprint_window = Some(chars);
        self
    }

    /// Set articles requested per news source
    pub fn news_limit_per_source(mut self, limit: usize) -> Self {
        self.news_limit_per_source = Some(limit);
        self
    }

    /// Enable or disable LLM news summaries
    pub fn summarize_news(mut self, enabled: bool) -> Self {
        self.summarize_news = Some(enabled);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set StockTwits requests per minute
    pub fn stocktwits_rate_limit(mut self, per_minute: u32) -> Self {
        self.stocktwits_rate_limit = Some(per_minute);
        self
    }

    /// Set Finnhub requests per minute
    pub fn finnhub_rate_limit(mut self, per_minute: u32) -> Self {
        self.finnhub_rate_limit = Some(per_minute);
        self
    }

    /// Set the model id
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the analysis completion budget
    pub fn max_analysis_tokens(mut self, tokens: usize) -> Self {
        self.max_analysis_tokens = Some(tokens);
        self
    }

    /// Set the analysis sampling temperature
    pub fn analysis_temperature(mut self, temperature: f32) -> Self {
        self.analysis_temperature = Some(temperature);
        self
    }

    /// Set Finnhub API key
    pub fn finnhub_api_key(mut self, key: impl Into<String>) -> Self {
        self.finnhub_api_key = Some(key.into());
        self
    }

    /// Load provider API keys from environment
    pub fn with_env_keys(mut self) -> Self {
        if let Some(key) = non_empty_env("FINNHUB_API_KEY") {
            self.finnhub_api_key = Some(key);
        }
        self
    }

    /// Load the model id from `WATCH_MODEL`
    pub fn from_env_model(mut self) -> Self {
        if let Some(model) = non_empty_env("WATCH_MODEL") {
            self.model = Some(model);
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<WatchConfig> {
        let defaults = WatchConfig::default();

        let config = WatchConfig {
            stale_threshold: self.stale_threshold.unwrap_or(defaults.stale_threshold),
            news_refresh_interval: self
                .news_refresh_interval
                .unwrap_or(defaults.news_refresh_interval),
            sentiment_refresh_interval: self
                .sentiment_refresh_interval
                .unwrap_or(defaults.sentiment_refresh_interval),
            fingerprint_window: self.fingerprint_window.unwrap_or(defaults.fingerprint_window),
            news_limit_per_source: self
                .news_limit_per_source
                .unwrap_or(defaults.news_limit_per_source),
            summarize_news: self.summarize_news.unwrap_or(defaults.summarize_news),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            stocktwits_rate_limit: self
                .stocktwits_rate_limit
                .unwrap_or(defaults.stocktwits_rate_limit),
            finnhub_rate_limit: self.finnhub_rate_limit.unwrap_or(defaults.finnhub_rate_limit),
            model: self.model.unwrap_or(defaults.model),
            max_analysis_tokens: self
                .max_analysis_tokens
                .unwrap_or(defaults.max_analysis_tokens),
            analysis_temperature: self
                .analysis_temperature
                .unwrap_or(defaults.analysis_temperature),
            finnhub_api_key: self.finnhub_api_key,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WatchConfig::default();
        assert_eq!(config.stale_threshold, Duration::from_secs(3600));
        assert_eq!(config.news_refresh_interval, Duration::from_secs(1800));
        assert_eq!(config.sentiment_refresh_interval, Duration::from_secs(900));
        assert_eq!(config.fingerprint_window, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = WatchConfig::builder()
            .stale_threshold(Duration::from_secs(60))
            .model("local-model")
            .summarize_news(true)
            .build()
            .unwrap();

        assert_eq!(config.stale_threshold, Duration::from_secs(60));
        assert_eq!(config.model, "local-model");
        assert!(config.summarize_news);
        assert_eq!(config.news_limit_per_source, 5);
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let config = WatchConfig {
            news_refresh_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_window() {
        let result = WatchConfig::builder().fingerprint_window(0).build();
        assert!(matches!(result, Err(WatchError::ConfigError(_))));
    }

    #[test]
    fn test_validation_rejects_zero_rate_limit() {
        let config = WatchConfig {
            stocktwits_rate_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
