//! Market data collaborators
//!
//! [`DataProvider`] yields one sub-bundle per call and each call fails on its
//! own, so the record builder can degrade sections independently.

use crate::api::{StockTwitsClient, YahooFinanceClient};
use crate::config::WatchConfig;
use crate::error::{Result, WatchError};
use crate::indicators;
use crate::options::{self, MAX_EXPIRATIONS};
use crate::record::{
    Fundamentals, Holdings, MultiTimeframe, OptionsVolatility, SectorAllocation,
    SentimentSnapshot, TechnicalSummary, Timeframe, TimeframeReading,
};
use crate::ticker::Ticker;
use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

/// Holdings requested for ETFs
const HOLDINGS_LIMIT: usize = 20;

/// Source of every sub-bundle except news
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Raw instrument type as reported by the metadata source ("EQUITY", "ETF", ...)
    async fn quote_type(&self, ticker: &Ticker) -> Result<String>;

    async fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals>;

    /// Daily indicators
    async fn technicals(&self, ticker: &Ticker) -> Result<TechnicalSummary>;

    /// Daily, weekly and monthly readings
    async fn multi_timeframe(&self, ticker: &Ticker) -> Result<MultiTimeframe>;

    async fn options(&self, ticker: &Ticker) -> Result<OptionsVolatility>;

    async fn sentiment(&self, ticker: &Ticker) -> Result<SentimentSnapshot>;

    /// ETF top holdings
    async fn holdings(&self, ticker: &Ticker) -> Result<Holdings>;

    /// ETF sector weights
    async fn sector_allocation(&self, ticker: &Ticker) -> Result<SectorAllocation>;
}

/// Yahoo Finance for prices, fundamentals and options; StockTwits for sentiment
pub struct MarketDataProvider {
    yahoo: YahooFinanceClient,
    stocktwits: StockTwitsClient,
}

impl MarketDataProvider {
    /// Create a provider from explicit clients
    pub fn new(yahoo: YahooFinanceClient, stocktwits: StockTwitsClient) -> Self {
        Self { yahoo, stocktwits }
    }

    /// Create a provider with clients built from configuration
    pub fn from_config(config: &WatchConfig) -> Result<Self> {
        Ok(Self::new(
            YahooFinanceClient::new(config.request_timeout)?,
            StockTwitsClient::new(config.stocktwits_rate_limit, config.request_timeout)?,
        ))
    }

    async fn reading(&self, ticker: &Ticker, timeframe: Timeframe) -> TimeframeReading {
        let result = match self.yahoo.candles(ticker, timeframe).await {
            Ok(candles) => indicators::timeframe_reading(timeframe, &candles),
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            warn!(ticker = %ticker, %timeframe, error = %e, "Timeframe reading failed");
            TimeframeReading::failed(timeframe, e.to_string())
        })
    }
}

#[async_trait]
impl DataProvider for MarketDataProvider {
    async fn quote_type(&self, ticker: &Ticker) -> Result<String> {
        self.yahoo.quote_type(ticker).await
    }

    async fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals> {
        self.yahoo.fundamentals(ticker).await
    }

    async fn technicals(&self, ticker: &Ticker) -> Result<TechnicalSummary> {
        let candles = self.yahoo.candles(ticker, Timeframe::Daily).await?;
        indicators::technical_summary(&candles)
    }

    async fn multi_timeframe(&self, ticker: &Ticker) -> Result<MultiTimeframe> {
        let readings =
            join_all(Timeframe::ALL.into_iter().map(|tf| self.reading(ticker, tf))).await;

        if readings.iter().all(|r| r.error.is_some()) {
            return Err(WatchError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "no timeframe could be read".to_string(),
            });
        }

        Ok(MultiTimeframe { readings })
    }

    async fn options(&self, ticker: &Ticker) -> Result<OptionsVolatility> {
        let (price, chains) = self.yahoo.option_chains(ticker, MAX_EXPIRATIONS).await?;
        if chains.is_empty() {
            return Err(WatchError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "no options data found".to_string(),
            });
        }
        Ok(options::summarize(price, &chains))
    }

    async fn sentiment(&self, ticker: &Ticker) -> Result<SentimentSnapshot> {
        self.stocktwits.sentiment(ticker).await
    }

    async fn holdings(&self, ticker: &Ticker) -> Result<Holdings> {
        self.yahoo.holdings(ticker, HOLDINGS_LIMIT).await
    }

    async fn sector_allocation(&self, ticker: &Ticker) -> Result<SectorAllocation> {
        self.yahoo.sector_allocation(ticker).await
    }
}
