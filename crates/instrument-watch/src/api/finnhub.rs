//! Finnhub company-news client

use super::{SharedRateLimiter, get_json, rate_limiter};
use crate::error::Result;
use crate::news::NewsSource;
use crate::record::NewsArticle;
use crate::ticker::Ticker;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const BASE_URL: &str = "https://finnhub.io/api/v1";
/// Days of company news requested
const LOOKBACK_DAYS: i64 = 7;

/// Finnhub news article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinnhubNewsArticle {
    /// Article category
    #[serde(default)]
    pub category: String,
    /// Publish time (UNIX timestamp)
    #[serde(default)]
    pub datetime: i64,
    /// News headline
    pub headline: String,
    /// Related symbols
    #[serde(default)]
    pub related: String,
    /// News source
    #[serde(default)]
    pub source: String,
    /// Article summary
    #[serde(default)]
    pub summary: String,
    /// Article URL
    #[serde(default)]
    pub url: String,
}

impl FinnhubNewsArticle {
    fn into_article(self, source: &str) -> NewsArticle {
        let non_empty = |s: String| Some(s).filter(|s| !s.trim().is_empty());
        NewsArticle {
            title: self.headline,
            publisher: non_empty(self.source),
            source: source.to_string(),
            url: non_empty(self.url),
            published_at: DateTime::from_timestamp(self.datetime, 0).filter(|_| self.datetime > 0),
            summary: non_empty(self.summary),
        }
    }
}

/// Finnhub client for news API
pub struct FinnhubClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl FinnhubClient {
    /// Create a new Finnhub client with rate limiting
    ///
    /// # Arguments
    /// * `api_key` - Finnhub API key
    /// * `rate_limit` - Requests per minute (free tier: 60, premium: 300+)
    pub fn new(api_key: impl Into<String>, rate_limit: u32, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            rate_limiter: rate_limiter(rate_limit, 60),
        })
    }

    /// Company news for a symbol between two dates (YYYY-MM-DD)
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn get_company_news(
        &self,
        ticker: &Ticker,
        from: &str,
        to: &str,
    ) -> Result<Vec<FinnhubNewsArticle>> {
        self.rate_limiter.until_ready().await;

        let request = self.client.get(format!("{}/company-news", self.base_url)).query(&[
            ("symbol", ticker.as_str()),
            ("from", from),
            ("to", to),
            ("token", self.api_key.as_str()),
        ]);

        let articles: Vec<FinnhubNewsArticle> = get_json(request, "Finnhub").await?;
        debug!(count = articles.len(), "Fetched Finnhub company news");
        Ok(articles)
    }
}

#[async_trait]
impl NewsSource for FinnhubClient {
    fn name(&self) -> &str {
        "finnhub"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn fetch_articles(&self, ticker: &Ticker, limit: usize) -> Result<Vec<NewsArticle>> {
        let to = Utc::now();
        let from = to - ChronoDuration::days(LOOKBACK_DAYS);

        let articles = self
            .get_company_news(
                ticker,
                &from.format("%Y-%m-%d").to_string(),
                &to.format("%Y-%m-%d").to_string(),
            )
            .await?;

        Ok(articles
            .into_iter()
            .filter(|a| !a.headline.trim().is_empty())
            .take(limit)
            .map(|a| a.into_article(self.name()))
            .collect())
    }
}
