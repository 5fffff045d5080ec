//! In-memory collaborators for unit tests

use crate::analysis::AnalysisGenerator;
use crate::error::{Result, WatchError};
use crate::news::{self, NewsFeed, NewsSource};
use crate::record::{
    Fundamentals, Holding, Holdings, InstrumentRecord, MultiTimeframe, NewsArticle, NewsBundle,
    OptionsVolatility, Profile, Recommendation, SectorAllocation, SectorWeight, Section,
    SentimentMessage, SentimentSnapshot, SentimentTag, TechnicalSummary, Timeframe,
    TimeframeReading,
};
use crate::provider::DataProvider;
use crate::ticker::{InstrumentKind, Ticker};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use watch_llm::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, StopReason, TokenUsage,
};

/// Scriptable [`DataProvider`] that counts calls
pub struct FakeProvider {
    quote_type: Option<String>,
    failing_options: bool,
    failing_everything: bool,
    sentiment_down: AtomicBool,
    sentiment_empty: AtomicBool,
    quote_type_calls: AtomicUsize,
    holdings_calls: AtomicUsize,
    sentiment_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            quote_type: Some("EQUITY".to_string()),
            failing_options: false,
            failing_everything: false,
            sentiment_down: AtomicBool::new(false),
            sentiment_empty: AtomicBool::new(false),
            quote_type_calls: AtomicUsize::new(0),
            holdings_calls: AtomicUsize::new(0),
            sentiment_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_quote_type(mut self, quote_type: &str) -> Self {
        self.quote_type = Some(quote_type.to_string());
        self
    }

    pub fn failing_quote_type(mut self) -> Self {
        self.quote_type = None;
        self
    }

    pub fn failing_options(mut self) -> Self {
        self.failing_options = true;
        self
    }

    pub fn failing_everything(mut self) -> Self {
        self.failing_everything = true;
        self.quote_type = None;
        self
    }

    pub fn set_sentiment_down(&self, down: bool) {
        self.sentiment_down.store(down, Ordering::SeqCst);
    }

    pub fn set_sentiment_empty(&self, empty: bool) {
        self.sentiment_empty.store(empty, Ordering::SeqCst);
    }

    pub fn quote_type_calls(&self) -> usize {
        self.quote_type_calls.load(Ordering::SeqCst)
    }

    pub fn holdings_calls(&self) -> usize {
        self.holdings_calls.load(Ordering::SeqCst)
    }

    pub fn sentiment_calls(&self) -> usize {
        self.sentiment_calls.load(Ordering::SeqCst)
    }

    fn check(&self, section: &str) -> Result<()> {
        if self.failing_everything {
            return Err(WatchError::ApiError(format!("{section} provider down")));
        }
        Ok(())
    }
}

#[async_trait]
impl DataProvider for FakeProvider {
    async fn quote_type(&self, ticker: &Ticker) -> Result<String> {
        self.quote_type_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.quote_type
            .clone()
            .ok_or_else(|| WatchError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "unknown symbol".to_string(),
            })
    }

    async fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals> {
        self.check("fundamentals")?;
        Ok(Fundamentals {
            profile: Profile {
                name: Some(format!("{ticker} Corp")),
                ..Profile::default()
            },
            ..Fundamentals::default()
        })
    }

    async fn technicals(&self, _ticker: &Ticker) -> Result<TechnicalSummary> {
        self.check("technicals")?;
        Ok(TechnicalSummary {
            close: Some(101.5),
            rsi: Some(55.0),
            ..TechnicalSummary::default()
        })
    }

    async fn multi_timeframe(&self, _ticker: &Ticker) -> Result<MultiTimeframe> {
        self.check("multi_timeframe")?;
        let readings = Timeframe::ALL
            .into_iter()
            .map(|timeframe| TimeframeReading {
                timeframe,
                recommendation: Some(Recommendation::Neutral),
                buy: 1,
                sell: 1,
                neutral: 3,
                rsi: Some(50.0),
                macd: None,
                error: None,
            })
            .collect();
        Ok(MultiTimeframe { readings })
    }

    async fn options(&self, ticker: &Ticker) -> Result<OptionsVolatility> {
        self.check("options")?;
        if self.failing_options {
            return Err(WatchError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "no options data found".to_string(),
            });
        }
        Ok(OptionsVolatility {
            underlying_price: Some(101.5),
            atm_iv_avg: Some(24.0),
            expirations_used: 3,
            ..OptionsVolatility::default()
        })
    }

    async fn sentiment(&self, _ticker: &Ticker) -> Result<SentimentSnapshot> {
        let n = self.sentiment_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.check("sentiment")?;
        if self.sentiment_down.load(Ordering::SeqCst) {
            return Err(WatchError::RateLimitExceeded {
                provider: "stocktwits".to_string(),
            });
        }
        if self.sentiment_empty.load(Ordering::SeqCst) {
            return Ok(SentimentSnapshot::default());
        }
        Ok(SentimentSnapshot::from_messages(vec![SentimentMessage {
            body: format!("post {n}"),
            sentiment: Some(SentimentTag::Bullish),
            created_at: None,
        }]))
    }

    async fn holdings(&self, _ticker: &Ticker) -> Result<Holdings> {
        self.holdings_calls.fetch_add(1, Ordering::SeqCst);
        self.check("holdings")?;
        Ok(Holdings {
            top: vec![Holding {
                symbol: "MSFT".to_string(),
                name: Some("Microsoft".to_string()),
                weight_pct: 7.1,
            }],
            count: 1,
        })
    }

    async fn sector_allocation(&self, _ticker: &Ticker) -> Result<SectorAllocation> {
        self.check("sector_allocation")?;
        Ok(SectorAllocation {
            sectors: vec![SectorWeight {
                sector: "Technology".to_string(),
                weight_pct: 31.0,
            }],
        })
    }
}

/// [`NewsFeed`] serving a settable headline list
pub struct FakeNews {
    headlines: Mutex<Option<Vec<String>>>,
    calls: AtomicUsize,
}

impl FakeNews {
    pub fn with_headlines(headlines: &[&str]) -> Self {
        let news = Self::failing();
        news.set_headlines(headlines);
        news
    }

    pub fn failing() -> Self {
        Self {
            headlines: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_headlines(&self, headlines: &[&str]) {
        *self.headlines.lock().unwrap() =
            Some(headlines.iter().map(|h| (*h).to_string()).collect());
    }

    pub fn set_failing(&self) {
        *self.headlines.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsFeed for FakeNews {
    async fn fetch(&self, ticker: &Ticker) -> Result<NewsBundle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let headlines = self
            .headlines
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| WatchError::ApiError(format!("all news sources failed for {ticker}")))?;

        let articles: Vec<NewsArticle> = headlines
            .into_iter()
            .map(|title| NewsArticle {
                title,
                source: "fake".to_string(),
                ..NewsArticle::default()
            })
            .collect();
        Ok(NewsBundle {
            digest: news::digest(&articles),
            sources: vec!["fake".to_string()],
            articles,
            summary: None,
        })
    }
}

/// [`NewsSource`] returning a fixed result
pub struct StaticNewsSource {
    name: String,
    articles: Option<Vec<NewsArticle>>,
    configured: bool,
}

impl StaticNewsSource {
    pub fn ok(name: &str, articles: Vec<NewsArticle>) -> Self {
        Self {
            name: name.to_string(),
            articles: Some(articles),
            configured: true,
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            articles: None,
            configured: true,
        }
    }

    pub fn unconfigured(name: &str) -> Self {
        Self {
            configured: false,
            ..Self::ok(name, Vec::new())
        }
    }
}

#[async_trait]
impl NewsSource for StaticNewsSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn fetch_articles(&self, _ticker: &Ticker, limit: usize) -> Result<Vec<NewsArticle>> {
        match &self.articles {
            Some(articles) => Ok(articles.iter().take(limit).cloned().collect()),
            None => Err(WatchError::ApiError(format!("{} unreachable", self.name))),
        }
    }
}

/// [`LLMProvider`] with a canned answer; remembers the last request
pub struct FakeLlm {
    reply: Option<String>,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl FakeLlm {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            ..Self::replying("")
        }
    }

    /// Fails the first request with a transient error, then replies
    pub fn failing_once(text: &str) -> Self {
        Self {
            failures_left: AtomicUsize::new(1),
            ..Self::replying(text)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for FakeLlm {
    async fn complete(&self, request: CompletionRequest) -> watch_llm::Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LLMError::RateLimitExceeded("try again later".to_string()));
        }
        let text = self
            .reply
            .clone()
            .ok_or_else(|| LLMError::RequestFailed("connection refused".to_string()))?;
        Ok(CompletionResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Counting [`AnalysisGenerator`] with a settable outcome
pub struct FakeGenerator {
    reply: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn replying(text: &str) -> Self {
        let generator = Self::failing();
        generator.set_reply(text);
        generator
    }

    pub fn failing() -> Self {
        Self {
            reply: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_reply(&self, text: &str) {
        *self.reply.lock().unwrap() = Some(text.to_string());
    }

    pub fn set_failing(&self) {
        *self.reply.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisGenerator for FakeGenerator {
    async fn generate(&self, record: &InstrumentRecord) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let reply = self.reply.lock().unwrap().clone();
        reply.ok_or_else(|| {
            WatchError::LlmError(LLMError::RequestFailed(format!(
                "model offline while analysing {}",
                record.ticker
            )))
        })
    }
}

/// Fully available record with one headline
pub fn sample_record(symbol: &str, kind: InstrumentKind) -> InstrumentRecord {
    let ticker = Ticker::parse(symbol).unwrap();
    let articles = vec![NewsArticle {
        title: format!("{ticker} beats estimates"),
        source: "yahoo".to_string(),
        ..NewsArticle::default()
    }];
    let (holdings, sector_allocation) = match kind {
        InstrumentKind::Etf => (
            Section::Available(Holdings::default()),
            Section::Available(SectorAllocation::default()),
        ),
        InstrumentKind::Stock => (Section::NotApplicable, Section::NotApplicable),
    };

    InstrumentRecord {
        kind,
        fundamentals: Section::Available(Fundamentals::default()),
        technicals: Section::Available(TechnicalSummary::default()),
        multi_timeframe: Section::Available(MultiTimeframe::default()),
        options: Section::Available(OptionsVolatility::default()),
        sentiment: Section::Available(SentimentSnapshot::default()),
        news: Section::Available(NewsBundle {
            digest: news::digest(&articles),
            sources: vec!["yahoo".to_string()],
            articles,
            summary: None,
        }),
        holdings,
        sector_allocation,
        fetched_at: Utc::now(),
        ticker,
    }
}
