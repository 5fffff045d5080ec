//! InstrumentRecord assembly

use crate::error::Result;
use crate::news::NewsFeed;
use crate::provider::DataProvider;
use crate::record::{InstrumentRecord, Section};
use crate::ticker::{InstrumentKind, Ticker};
use chrono::Utc;
use std::future::Future;
use tracing::{info, warn};

fn section<T>(ticker: &Ticker, name: &str, result: Result<T>) -> Section<T> {
    if let Err(e) = &result {
        warn!(ticker = %ticker, section = name, error = %e, "Sub-bundle unavailable");
    }
    Section::from_result(result)
}

/// Await `fetch` only for ETFs
async fn etf_only<T, F>(ticker: &Ticker, name: &str, kind: InstrumentKind, fetch: F) -> Section<T>
where
    F: Future<Output = Result<T>>,
{
    if kind.is_etf() {
        section(ticker, name, fetch.await)
    } else {
        Section::NotApplicable
    }
}

/// Fetch every sub-bundle concurrently and assemble a complete record
///
/// Never fails. Each failed fetch becomes an unavailable section carrying its
/// error text; holdings and sector allocation are not applicable to stocks.
pub async fn build_record(
    provider: &dyn DataProvider,
    news: &dyn NewsFeed,
    ticker: &Ticker,
    kind: InstrumentKind,
) -> InstrumentRecord {
    let (fundamentals, technicals, multi_timeframe, options, sentiment, news, holdings, sectors) = tokio::join!(
        provider.fundamentals(ticker),
        provider.technicals(ticker),
        provider.multi_timeframe(ticker),
        provider.options(ticker),
        provider.sentiment(ticker),
        news.fetch(ticker),
        etf_only(ticker, "holdings", kind, provider.holdings(ticker)),
        etf_only(ticker, "sector_allocation", kind, provider.sector_allocation(ticker)),
    );

    let record = InstrumentRecord {
        ticker: ticker.clone(),
        kind,
        fundamentals: section(ticker, "fundamentals", fundamentals),
        technicals: section(ticker, "technicals", technicals),
        multi_timeframe: section(ticker, "multi_timeframe", multi_timeframe),
        options: section(ticker, "options", options),
        sentiment: section(ticker, "sentiment", sentiment),
        news: section(ticker, "news", news),
        holdings,
        sector_allocation: sectors,
        fetched_at: Utc::now(),
    };

    let available = record
        .section_statuses()
        .iter()
        .filter(|(_, status)| *status == "available")
        .count();
    info!(ticker = %ticker, %kind, available, "Built instrument record");

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNews, FakeProvider};

    #[tokio::test]
    async fn test_stock_record_is_complete() {
        let provider = FakeProvider::new();
        let news = FakeNews::with_headlines(&["Earnings beat"]);
        let ticker = Ticker::parse("AAPL").unwrap();

        let record = build_record(&provider, &news, &ticker, InstrumentKind::Stock).await;

        assert_eq!(record.kind, InstrumentKind::Stock);
        assert!(record.fundamentals.is_available());
        assert!(record.technicals.is_available());
        assert!(record.multi_timeframe.is_available());
        assert!(record.options.is_available());
        assert!(record.sentiment.is_available());
        assert!(record.news_text().contains("Earnings beat"));
        assert_eq!(record.holdings, Section::NotApplicable);
        assert_eq!(record.sector_allocation, Section::NotApplicable);
        assert_eq!(provider.holdings_calls(), 0);
    }

    #[tokio::test]
    async fn test_etf_record_fetches_holdings() {
        let provider = FakeProvider::new();
        let news = FakeNews::with_headlines(&[]);
        let ticker = Ticker::parse("SPY").unwrap();

        let record = build_record(&provider, &news, &ticker, InstrumentKind::Etf).await;

        assert!(record.holdings.is_available());
        assert!(record.sector_allocation.is_available());
        assert_eq!(provider.holdings_calls(), 1);
        assert_eq!(record.news_text(), "");
    }

    #[tokio::test]
    async fn test_options_failure_is_isolated() {
        let provider = FakeProvider::new().failing_options();
        let news = FakeNews::with_headlines(&["Story"]);
        let ticker = Ticker::parse("AAPL").unwrap();

        let record = build_record(&provider, &news, &ticker, InstrumentKind::Stock).await;

        assert!(record.options.reason().unwrap().contains("options"));
        assert!(record.fundamentals.is_available());
        assert!(record.technicals.is_available());
        assert!(record.news.is_available());
    }

    #[tokio::test]
    async fn test_everything_failing_still_builds() {
        let provider = FakeProvider::new().failing_everything();
        let news = FakeNews::failing();
        let ticker = Ticker::parse("ZZZ").unwrap();

        let record = build_record(&provider, &news, &ticker, InstrumentKind::Etf).await;

        for (name, status) in record.section_statuses() {
            assert_eq!(status, "unavailable", "{name} should be unavailable");
        }
    }
}
