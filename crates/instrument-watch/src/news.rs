//! Multi-source news aggregation

use crate::api::{FinnhubClient, YahooNewsClient, truncate};
use crate::config::WatchConfig;
use crate::error::{Result, WatchError};
use crate::record::{NewsArticle, NewsBundle};
use crate::ticker::Ticker;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use watch_llm::{CompletionRequest, LLMProvider, Message};

/// Articles listed in the digest
const DIGEST_ARTICLES: usize = 10;
/// Articles sent to the summarizer
const SUMMARY_ARTICLES: usize = 15;
/// Leading title words compared when deduplicating
const DEDUP_WORDS: usize = 8;
/// Pause before retrying a summary after a transient failure
const SUMMARY_RETRY_DELAY: Duration = Duration::from_secs(2);

/// One news provider
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Short identifier, recorded on every article
    fn name(&self) -> &str;

    /// Whether credentials are present; unconfigured sources are skipped
    fn is_configured(&self) -> bool {
        true
    }

    /// Newest articles about `ticker`, at most `limit`
    async fn fetch_articles(&self, ticker: &Ticker, limit: usize) -> Result<Vec<NewsArticle>>;
}

/// Where the coordinator gets news bundles from
#[async_trait]
pub trait NewsFeed: Send + Sync {
    /// Fetch, deduplicate and digest news for `ticker`
    async fn fetch(&self, ticker: &Ticker) -> Result<NewsBundle>;
}

/// Optional LLM executive summary of the articles
struct NewsSummarizer {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl NewsSummarizer {
    async fn summarize(&self, ticker: &Ticker, articles: &[NewsArticle]) -> Result<String> {
        let mut news_text = format!("News articles for {ticker}:\n\n");
        for (i, article) in articles.iter().take(SUMMARY_ARTICLES).enumerate() {
            let _ = writeln!(news_text, "--- Article {} ---", i + 1);
            let _ = writeln!(news_text, "Title: {}", article.title);
            let _ = writeln!(news_text, "Source: {}", publisher_label(article));
            if let Some(date) = article.published_at {
                let _ = writeln!(news_text, "Date: {}", date.format("%Y-%m-%d"));
            }
            if let Some(summary) = article.summary.as_deref() {
                let _ = writeln!(news_text, "Content: {}", truncate(summary, 500));
            }
            news_text.push('\n');
        }

        let prompt = format!(
            "Analyze the following news about {ticker} and write an executive summary.\n\n\
             {news_text}\n\
             Include:\n\
             1. **Overview**: 5-6 sentences with the most important points.\n\
             2. **Key Events**: list of relevant events.\n\
             3. **Market Sentiment**: positive, negative or neutral.\n\
             4. **Potential Impact**: how these could move the price.\n\n\
             Be concise and focus on actionable information."
        );

        let request = CompletionRequest::builder(&self.model)
            .add_message(Message::user(prompt))
            .max_tokens(1024)
            .temperature(0.3)
            .build();

        let response = match self.provider.complete(request.clone()).await {
            Err(e) if e.is_transient() => {
                warn!(ticker = %ticker, error = %e, "News summary failed, retrying once");
                tokio::time::sleep(SUMMARY_RETRY_DELAY).await;
                self.provider.complete(request).await?
            }
            other => other?,
        };
        Ok(response.text().to_string())
    }
}

/// Fans out to every configured [`NewsSource`] and merges the results
pub struct NewsAggregator {
    sources: Vec<Arc<dyn NewsSource>>,
    limit_per_source: usize,
    summarizer: Option<NewsSummarizer>,
}

impl NewsAggregator {
    /// Create an aggregator over the given sources
    pub fn new(sources: Vec<Arc<dyn NewsSource>>, limit_per_source: usize) -> Self {
        for source in &sources {
            let status = if source.is_configured() {
                "configured"
            } else {
                "not configured"
            };
            info!(source = source.name(), status, "News source");
        }

        Self {
            sources,
            limit_per_source,
            summarizer: None,
        }
    }

    /// Yahoo news plus Finnhub when an API key is present
    pub fn from_config(config: &WatchConfig) -> Result<Self> {
        let mut sources: Vec<Arc<dyn NewsSource>> =
            vec![Arc::new(YahooNewsClient::new(config.request_timeout)?)];
        if let Some(key) = config.finnhub_api_key.as_deref() {
            sources.push(Arc::new(FinnhubClient::new(
                key,
                config.finnhub_rate_limit,
                config.request_timeout,
            )?));
        }
        Ok(Self::new(sources, config.news_limit_per_source))
    }

    /// Ask `provider` for an executive summary of each bundle
    pub fn with_summarizer(mut self, provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        self.summarizer = Some(NewsSummarizer {
            provider,
            model: model.into(),
        });
        self
    }

    /// Names of the sources that will be queried
    pub fn active_sources(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|s| s.is_configured())
            .map(|s| s.name())
            .collect()
    }
}

#[async_trait]
impl NewsFeed for NewsAggregator {
    async fn fetch(&self, ticker: &Ticker) -> Result<NewsBundle> {
        let active: Vec<&Arc<dyn NewsSource>> =
            self.sources.iter().filter(|s| s.is_configured()).collect();
        if active.is_empty() {
            return Err(WatchError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "no news sources configured".to_string(),
            });
        }

        let results = join_all(
            active
                .iter()
                .map(|source| source.fetch_articles(ticker, self.limit_per_source)),
        )
        .await;

        let mut articles = Vec::new();
        let mut failures = Vec::new();
        for (source, result) in active.iter().zip(results) {
            match result {
                Ok(batch) => articles.extend(batch),
                Err(e) => {
                    warn!(ticker = %ticker, source = source.name(), error = %e, "News source failed");
                    failures.push(format!("{}: {e}", source.name()));
                }
            }
        }

        if failures.len() == active.len() {
            return Err(WatchError::ApiError(format!(
                "all news sources failed ({})",
                failures.join("; ")
            )));
        }

        let total = articles.len();
        let mut articles = deduplicate(articles);
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        info!(ticker = %ticker, total, unique = articles.len(), "Fetched news");

        let mut sources: Vec<String> = articles.iter().map(|a| a.source.clone()).collect();
        sources.sort();
        sources.dedup();

        let summary = match &self.summarizer {
            Some(summarizer) if !articles.is_empty() => {
                match summarizer.summarize(ticker, &articles).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!(ticker = %ticker, error = %e, "News summary failed");
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(NewsBundle {
            digest: digest(&articles),
            articles,
            sources,
            summary,
        })
    }
}

fn publisher_label(article: &NewsArticle) -> String {
    match article.publisher.as_deref() {
        Some(publisher) => format!("{publisher} ({})", article.source),
        None => article.source.clone(),
    }
}

/// Drop articles whose titles share their first eight words with an earlier one
///
/// Untitled articles are always kept.
pub fn deduplicate(articles: Vec<NewsArticle>) -> Vec<NewsArticle> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|article| {
            let key = article
                .title
                .to_lowercase()
                .split_whitespace()
                .take(DEDUP_WORDS)
                .collect::<Vec<_>>()
                .join(" ");
            key.is_empty() || seen.insert(key)
        })
        .collect()
}

/// Numbered listing of the newest articles; empty when there are none
pub fn digest(articles: &[NewsArticle]) -> String {
    let mut out = String::new();
    for (i, article) in articles.iter().take(DIGEST_ARTICLES).enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, article.title);
        let _ = writeln!(out, "   Source: {}", publisher_label(article));
        if let Some(date) = article.published_at {
            let _ = writeln!(out, "   Date: {}", date.format("%Y-%m-%d %H:%M"));
        }
        if let Some(summary) = article.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            let short = truncate(summary, 300);
            let ellipsis = if short.len() < summary.len() { "..." } else { "" };
            let _ = writeln!(out, "   Summary: {short}{ellipsis}");
        }
        out.push('\n');
    }
    out
}
