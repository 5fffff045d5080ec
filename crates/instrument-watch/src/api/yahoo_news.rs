//! Yahoo Finance news via the search endpoint (no key required)

use super::{USER_AGENT, get_json};
use crate::error::Result;
use crate::news::NewsSource;
use crate::record::NewsArticle;
use crate::ticker::Ticker;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

const SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<SearchNewsItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNewsItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    publisher: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    provider_publish_time: Option<i64>,
}

/// Yahoo news search client
pub struct YahooNewsClient {
    client: Client,
    search_url: String,
}

impl YahooNewsClient {
    /// Create a new client
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(timeout)
                .build()?,
            search_url: SEARCH_URL.to_string(),
        })
    }
}

fn convert(items: Vec<SearchNewsItem>, source: &str, limit: usize) -> Vec<NewsArticle> {
    items
        .into_iter()
        .filter(|item| !item.title.trim().is_empty())
        .take(limit)
        .map(|item| NewsArticle {
            title: item.title,
            publisher: item.publisher,
            source: source.to_string(),
            url: item.link,
            published_at: item
                .provider_publish_time
                .and_then(|t| DateTime::from_timestamp(t, 0)),
            summary: None,
        })
        .collect()
}

#[async_trait]
impl NewsSource for YahooNewsClient {
    fn name(&self) -> &str {
        "yahoo"
    }

    #[instrument(skip(self), fields(ticker = %ticker))]
    async fn fetch_articles(&self, ticker: &Ticker, limit: usize) -> Result<Vec<NewsArticle>> {
        let count = limit.to_string();
        let request = self.client.get(&self.search_url).query(&[
            ("q", ticker.as_str()),
            ("quotesCount", "0"),
            ("newsCount", count.as_str()),
        ]);

        let response: SearchResponse = get_json(request, "Yahoo Finance").await?;
        Ok(convert(response.news, self.name(), limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_search_news() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"count": 2, "quotes": [], "news": [
                {"uuid": "a", "title": "Nvidia hits record", "publisher": "Barron's",
                 "link": "https://example.com/n", "providerPublishTime": 1714572000, "type": "STORY"},
                {"uuid": "b", "title": "  "},
                {"uuid": "c", "title": "Chip stocks rally"}
            ]}"#,
        )
        .unwrap();

        let articles = convert(response.news, "yahoo", 5);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].publisher.as_deref(), Some("Barron's"));
        assert!(articles[0].published_at.is_some());
        assert!(articles[1].published_at.is_none());
    }

    #[test]
    fn test_convert_respects_limit() {
        let items = (0..4)
            .map(|i| SearchNewsItem {
                title: format!("Story {i}"),
                publisher: None,
                link: None,
                provider_publish_time: None,
            })
            .collect();
        assert_eq!(convert(items, "yahoo", 3).len(), 3);
    }

    #[test]
    fn test_missing_news_field_is_empty() {
        let response: SearchResponse = serde_json::from_str(r#"{"quotes": []}"#).unwrap();
        assert!(response.news.is_empty());
    }
}
