//! StockTwits client for retail sentiment

use super::{SharedRateLimiter, USER_AGENT, get_json, rate_limiter};
use crate::error::Result;
use crate::record::{SentimentMessage, SentimentSnapshot, SentimentTag};
use crate::ticker::Ticker;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const BASE_URL: &str = "https://api.stocktwits.com/api/2";

#[derive(Debug, Deserialize)]
struct StreamResponse {
    // Required: a body without messages is an error page, not an empty stream
    messages: Vec<StreamMessage>,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    body: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    entities: Option<Entities>,
}

#[derive(Debug, Deserialize)]
struct Entities {
    #[serde(default)]
    sentiment: Option<Sentiment>,
}

#[derive(Debug, Deserialize)]
struct Sentiment {
    #[serde(default)]
    basic: Option<String>,
}

impl From<StreamMessage> for SentimentMessage {
    fn from(message: StreamMessage) -> Self {
        let sentiment = message
            .entities
            .and_then(|e| e.sentiment)
            .and_then(|s| s.basic)
            .and_then(|tag| match tag.as_str() {
                "Bullish" => Some(SentimentTag::Bullish),
                "Bearish" => Some(SentimentTag::Bearish),
                _ => None,
            });

        SentimentMessage {
            body: message.body,
            sentiment,
            created_at: message.created_at,
        }
    }
}

/// StockTwits symbol-stream client with rate limiting
pub struct StockTwitsClient {
    client: Client,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl StockTwitsClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `rate_limit` - Requests per minute (unauthenticated limit is low; 30 is safe)
    pub fn new(rate_limit: u32, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            rate_limiter: rate_limiter(rate_limit, 30),
        })
    }

    /// Point the client at another host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Latest stream messages with their bullish/bearish distribution
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn sentiment(&self, ticker: &Ticker) -> Result<SentimentSnapshot> {
        self.rate_limiter.until_ready().await;

        let request = self
            .client
            .get(format!("{}/streams/symbol/{ticker}.json", self.base_url))
            .header("Accept", "application/json")
            .header("Referer", "https://stocktwits.com/");

        let stream: StreamResponse = get_json(request, "StockTwits").await?;
        debug!(count = stream.messages.len(), "Fetched StockTwits messages");

        Ok(SentimentSnapshot::from_messages(
            stream.messages.into_iter().map(SentimentMessage::from).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream() {
        let stream: StreamResponse = serde_json::from_str(
            r#"{
                "symbol": {"symbol": "AAPL"},
                "messages": [
                    {"body": "to the moon", "created_at": "2024-05-01T14:00:00Z",
                     "entities": {"sentiment": {"basic": "Bullish"}}},
                    {"body": "overvalued", "entities": {"sentiment": {"basic": "Bearish"}}},
                    {"body": "holding", "entities": {"sentiment": null}}
                ]
            }"#,
        )
        .unwrap();

        let messages: Vec<SentimentMessage> =
            stream.messages.into_iter().map(SentimentMessage::from).collect();
        assert_eq!(messages[0].sentiment, Some(SentimentTag::Bullish));
        assert!(messages[0].created_at.is_some());
        assert_eq!(messages[1].sentiment, Some(SentimentTag::Bearish));
        assert_eq!(messages[2].sentiment, None);
    }

    #[test]
    fn test_missing_messages_is_error() {
        let parsed = serde_json::from_str::<StreamResponse>(r#"{"response": {"status": 404}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_client_creation() {
        let client = StockTwitsClient::new(30, Duration::from_secs(10))
            .unwrap()
            .with_base_url("http://localhost:9999/");
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
