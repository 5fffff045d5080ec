//! Per-ticker cache and refresh coordinator for stocks and ETFs
//!
//! This crate keeps one analysed snapshot per ticker and keeps it current.
//! It includes:
//!
//! - STOCK / ETF classification from instrument metadata
//! - Record assembly from Yahoo Finance, StockTwits and news providers, with
//!   each section degrading on its own
//! - Technical indicators, multi-timeframe readings and options volatility
//! - Multi-source news aggregation with an optional LLM summary
//! - LLM narrative analysis from kind-specific prompt templates
//! - Background news and sentiment refresh with change fingerprinting
//!
//! # Example
//!
//! ```rust,ignore
//! use instrument_watch::{
//!     InstrumentCoordinator, LlmAnalysisGenerator, MarketDataProvider, NewsAggregator,
//!     WatchConfig,
//! };
//! use std::sync::Arc;
//! use watch_llm::providers::OpenAIProvider;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = WatchConfig::builder().with_env_keys().build()?;
//!     let llm = Arc::new(OpenAIProvider::from_env()?);
//!
//!     let coordinator = InstrumentCoordinator::new(
//!         config.clone(),
//!         Arc::new(MarketDataProvider::from_config(&config)?),
//!         Arc::new(NewsAggregator::from_config(&config)?),
//!         Arc::new(LlmAnalysisGenerator::from_config(llm, &config)),
//!     );
//!
//!     let view = coordinator.get_or_create("aapl").await?;
//!     println!("{} ({}): {}", view.ticker, view.kind, view.analysis);
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod api;
pub mod builder;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fingerprint;
pub mod indicators;
pub mod news;
pub mod options;
pub mod prompts;
pub mod provider;
pub mod record;
pub mod scheduler;
pub mod ticker;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use analysis::{AnalysisGenerator, LlmAnalysisGenerator};
pub use config::{WatchConfig, WatchConfigBuilder};
pub use coordinator::{InstrumentCoordinator, InstrumentView, RefreshOutcome};
pub use error::{Result, WatchError};
pub use fingerprint::Fingerprint;
pub use news::{NewsAggregator, NewsFeed, NewsSource};
pub use provider::{DataProvider, MarketDataProvider};
pub use record::{InstrumentRecord, NewsBundle, Section};
pub use scheduler::{JobId, JobKind, JobScheduler};
pub use ticker::{InstrumentKind, Ticker};
