//! Typed instrument snapshot
//!
//! Provider payloads are converted into these structures at the client
//! boundary. Every section of an [`InstrumentRecord`] is always present:
//! a failed fetch becomes [`Section::Unavailable`] carrying the error text,
//! and ETF-only sections are [`Section::NotApplicable`] for stocks. Values
//! inside a section are `Option`s because providers omit fields freely.

use crate::error::WatchError;
use crate::ticker::{InstrumentKind, Ticker};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One sub-bundle of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    /// Fetched successfully
    Available(T),
    /// Fetch failed; `reason` carries the error text
    Unavailable { reason: String },
    /// Does not apply to this instrument kind
    NotApplicable,
}

impl<T> Section<T> {
    /// Placeholder for a failed fetch
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Convert a fetch result, keeping the error text on failure
    pub fn from_result(result: Result<T, WatchError>) -> Self {
        match result {
            Ok(value) => Self::Available(value),
            Err(e) => Self::unavailable(e.to_string()),
        }
    }

    /// The data, if available
    pub fn available(&self) -> Option<&T> {
        match self {
            Self::Available(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the data was fetched
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Failure text for unavailable sections
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Unavailable { reason } => Some(reason),
            _ => None,
        }
    }

    /// Short status word for tables and logs
    pub fn status(&self) -> &'static str {
        match self {
            Self::Available(_) => "available",
            Self::Unavailable { .. } => "unavailable",
            Self::NotApplicable => "n/a",
        }
    }
}

/// Company or fund profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub fund_family: Option<String>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
}

/// Trading block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    pub price: Option<f64>,
    pub previous_close: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub volume: Option<u64>,
    pub avg_volume: Option<u64>,
    pub market_cap: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub fifty_two_week_change: Option<f64>,
    pub fifty_day_average: Option<f64>,
    pub two_hundred_day_average: Option<f64>,
    pub beta: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub pe_trailing: Option<f64>,
    pub pe_forward: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub price_to_book: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub ev_to_ebitda: Option<f64>,
    pub ev_to_revenue: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profitability {
    pub eps_trailing: Option<f64>,
    pub eps_forward: Option<f64>,
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub profit_margin: Option<f64>,
    pub roe: Option<f64>,
    pub roa: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub total_debt: Option<f64>,
    pub total_cash: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dividends {
    pub dividend_rate: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub five_year_avg_dividend_yield: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Growth {
    pub earnings_growth: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_quarterly_growth: Option<f64>,
}

/// Sell-side consensus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalystConsensus {
    pub recommendation_key: Option<String>,
    /// 1 (strong buy) to 5 (sell)
    pub recommendation_mean: Option<f64>,
    pub target_high_price: Option<f64>,
    pub target_low_price: Option<f64>,
    pub target_mean_price: Option<f64>,
    pub number_of_analysts: Option<u32>,
}

/// Fund-only metrics; empty for stocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundMetrics {
    pub expense_ratio: Option<f64>,
    pub total_assets: Option<f64>,
    pub ytd_return: Option<f64>,
    pub three_year_return: Option<f64>,
    pub five_year_return: Option<f64>,
    pub nav_price: Option<f64>,
}

/// Fundamentals sub-bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub profile: Profile,
    pub price: PriceInfo,
    pub valuation: Valuation,
    pub profitability: Profitability,
    pub debt: Debt,
    pub dividends: Dividends,
    pub growth: Growth,
    pub analyst: AnalystConsensus,
    pub fund: FundMetrics,
}

/// Indicator vote outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    #[default]
    Neutral,
    Sell,
    StrongSell,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::StrongBuy => "STRONG_BUY",
            Self::Buy => "BUY",
            Self::Neutral => "NEUTRAL",
            Self::Sell => "SELL",
            Self::StrongSell => "STRONG_SELL",
        };
        f.write_str(label)
    }
}

/// SMA and EMA for one period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovingAverage {
    pub period: usize,
    pub sma: Option<f64>,
    pub ema: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BollingerReading {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Daily technical indicators and their aggregate vote
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSummary {
    pub recommendation: Recommendation,
    pub buy: u32,
    pub sell: u32,
    pub neutral: u32,
    pub close: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub moving_averages: Vec<MovingAverage>,
    pub bollinger: Option<BollingerReading>,
    pub atr: Option<f64>,
}

/// Candle interval for multi-timeframe readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1D")]
    Daily,
    #[serde(rename = "1W")]
    Weekly,
    #[serde(rename = "1M")]
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Daily, Timeframe::Weekly, Timeframe::Monthly];

    /// Yahoo chart interval
    pub fn interval(self) -> &'static str {
        match self {
            Self::Daily => "1d",
            Self::Weekly => "1wk",
            Self::Monthly => "1mo",
        }
    }

    /// Yahoo chart range giving enough candles for a 200-period average
    pub fn range(self) -> &'static str {
        match self {
            Self::Daily => "1y",
            Self::Weekly => "5y",
            Self::Monthly => "max",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "1D"),
            Self::Weekly => write!(f, "1W"),
            Self::Monthly => write!(f, "1M"),
        }
    }
}

/// Reading for one timeframe; `error` is set when that interval failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeReading {
    pub timeframe: Timeframe,
    pub recommendation: Option<Recommendation>,
    pub buy: u32,
    pub sell: u32,
    pub neutral: u32,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub error: Option<String>,
}

impl TimeframeReading {
    /// Reading for a timeframe whose candles could not be fetched
    pub fn failed(timeframe: Timeframe, error: impl Into<String>) -> Self {
        Self {
            timeframe,
            recommendation: None,
            buy: 0,
            sell: 0,
            neutral: 0,
            rsi: None,
            macd: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiTimeframe {
    pub readings: Vec<TimeframeReading>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

/// Contract with volume well above its open interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnusualContract {
    pub kind: OptionKind,
    pub strike: f64,
    pub expiration: Option<DateTime<Utc>>,
    pub volume: u64,
    pub open_interest: u64,
    /// volume / open interest; `None` when open interest is zero
    pub ratio: Option<f64>,
}

/// Options-implied volatility and unusual activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsVolatility {
    pub underlying_price: Option<f64>,
    /// Average implied volatility near the money, in percent
    pub atm_iv_avg: Option<f64>,
    pub expirations_used: usize,
    pub unusual_activity_count: usize,
    pub top_unusual: Vec<UnusualContract>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentTag {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentMessage {
    pub body: String,
    pub sentiment: Option<SentimentTag>,
    pub created_at: Option<DateTime<Utc>>,
}

/// StockTwits stream with its tag distribution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    pub messages: Vec<SentimentMessage>,
    pub bullish_pct: f64,
    pub bearish_pct: f64,
    pub neutral_pct: f64,
}

impl SentimentSnapshot {
    /// Build a snapshot and compute the distribution from the message tags
    pub fn from_messages(messages: Vec<SentimentMessage>) -> Self {
        let total = messages.len();
        if total == 0 {
            return Self::default();
        }

        let bullish = messages
            .iter()
            .filter(|m| m.sentiment == Some(SentimentTag::Bullish))
            .count();
        let bearish = messages
            .iter()
            .filter(|m| m.sentiment == Some(SentimentTag::Bearish))
            .count();
        let neutral = total - bullish - bearish;

        let pct = |n: usize| n as f64 * 100.0 / total as f64;
        Self {
            messages,
            bullish_pct: pct(bullish),
            bearish_pct: pct(bearish),
            neutral_pct: pct(neutral),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub publisher: Option<String>,
    /// News source that returned the article
    pub source: String,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// Deduplicated news with its deterministic digest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsBundle {
    pub articles: Vec<NewsArticle>,
    pub sources: Vec<String>,
    /// Numbered listing of the newest articles; the change fingerprint input
    pub digest: String,
    /// Optional executive summary from the LLM
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub name: Option<String>,
    pub weight_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Holdings {
    pub top: Vec<Holding>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorWeight {
    pub sector: String,
    pub weight_pct: f64,
}

/// Sector weights, largest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorAllocation {
    pub sectors: Vec<SectorWeight>,
}

/// Complete snapshot of one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub ticker: Ticker,
    pub kind: InstrumentKind,
    pub fundamentals: Section<Fundamentals>,
    pub technicals: Section<TechnicalSummary>,
    pub multi_timeframe: Section<MultiTimeframe>,
    pub options: Section<OptionsVolatility>,
    pub sentiment: Section<SentimentSnapshot>,
    pub news: Section<NewsBundle>,
    pub holdings: Section<Holdings>,
    pub sector_allocation: Section<SectorAllocation>,
    pub fetched_at: DateTime<Utc>,
}

impl InstrumentRecord {
    /// Text representation of the volatile news subset; empty without news
    pub fn news_text(&self) -> &str {
        self.news.available().map_or("", |news| news.digest.as_str())
    }

    /// Sections as `(name, status)` pairs in display order
    pub fn section_statuses(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("fundamentals", self.fundamentals.status()),
            ("technicals", self.technicals.status()),
            ("multi_timeframe", self.multi_timeframe.status()),
            ("options", self.options.status()),
            ("sentiment", self.sentiment.status()),
            ("news", self.news.status()),
            ("holdings", self.holdings.status()),
            ("sector_allocation", self.sector_allocation.status()),
        ]
    }
}
