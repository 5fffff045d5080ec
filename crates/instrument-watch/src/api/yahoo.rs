//! Yahoo Finance client
//!
//! Candles come through `yahoo_finance_api`; quote-summary modules and option
//! chains are read straight from Yahoo's JSON endpoints, which need a
//! session cookie plus crumb token.

use super::{USER_AGENT, get_json};
use crate::error::{Result, WatchError};
use crate::record::{
    AnalystConsensus, Debt, Dividends, FundMetrics, Fundamentals, Growth, Holding, Holdings,
    OptionKind, PriceInfo, Profile, Profitability, SectorAllocation, SectorWeight, Timeframe,
    Valuation,
};
use crate::ticker::Ticker;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const OPTIONS_URL: &str = "https://query2.finance.yahoo.com/v7/finance/options";
const CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";
const COOKIE_URL: &str = "https://fc.yahoo.com";

const FUNDAMENTAL_MODULES: &[&str] = &[
    "price",
    "summaryDetail",
    "assetProfile",
    "defaultKeyStatistics",
    "financialData",
    "fundProfile",
];

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Single option contract as far as the volatility summary needs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub kind: OptionKind,
    pub strike: f64,
    pub volume: u64,
    pub open_interest: u64,
    /// Implied volatility as a fraction (0.25 = 25 %)
    pub implied_volatility: Option<f64>,
}

/// Calls and puts for one expiration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub expiration: Option<DateTime<Utc>>,
    pub contracts: Vec<OptionContract>,
}

/// Yahoo Finance API client
pub struct YahooFinanceClient {
    http: Client,
    connector: yahoo::YahooConnector,
    crumb: RwLock<Option<String>>,
}

impl YahooFinanceClient {
    /// Create a new Yahoo Finance client
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        let connector = yahoo::YahooConnector::new()
            .map_err(|e| WatchError::YahooFinanceError(e.to_string()))?;

        Ok(Self {
            http,
            connector,
            crumb: RwLock::new(None),
        })
    }

    /// Candles for one timeframe, oldest first
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn candles(&self, ticker: &Ticker, timeframe: Timeframe) -> Result<Vec<Candle>> {
        let response = self
            .connector
            .get_quote_range(ticker.as_str(), timeframe.interval(), timeframe.range())
            .await
            .map_err(|e| WatchError::YahooFinanceError(e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| WatchError::YahooFinanceError(e.to_string()))?;

        let mut candles: Vec<Candle> = quotes
            .iter()
            .filter_map(|q| {
                let timestamp = i64::try_from(q.timestamp)
                    .ok()
                    .and_then(|t| DateTime::from_timestamp(t, 0))?;
                Some(Candle {
                    timestamp,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume,
                })
            })
            .collect();
        candles.sort_by_key(|c| c.timestamp);

        if candles.is_empty() {
            return Err(WatchError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: format!("no {timeframe} candles"),
            });
        }

        debug!(count = candles.len(), %timeframe, "Fetched candles");
        Ok(candles)
    }

    /// Session crumb, fetched once and reused
    async fn crumb(&self) -> Result<String> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let mut slot = self.crumb.write().await;
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }

        // The cookie endpoint answers 404 but sets the session cookie
        let _ = self.http.get(COOKIE_URL).send().await;

        let crumb = self.http.get(CRUMB_URL).send().await?.text().await?;
        let crumb = crumb.trim().to_string();
        if crumb.is_empty() || crumb.contains('<') || crumb.contains("Too Many") {
            return Err(WatchError::YahooFinanceError(
                "could not obtain session crumb".to_string(),
            ));
        }

        *slot = Some(crumb.clone());
        Ok(crumb)
    }

    /// First `quoteSummary` result for the given modules
    async fn quote_summary(&self, ticker: &Ticker, modules: &[&str]) -> Result<Value> {
        let crumb = self.crumb().await?;
        let request = self
            .http
            .get(format!("{QUOTE_SUMMARY_URL}/{ticker}"))
            .query(&[("modules", modules.join(",")), ("crumb", crumb)]);

        let body: Value = match get_json(request, "Yahoo Finance").await {
            Ok(body) => body,
            Err(e) => {
                // A rejected crumb is dropped so the next call starts a new session
                *self.crumb.write().await = None;
                return Err(e);
            }
        };

        first_result(&body, "quoteSummary").ok_or_else(|| WatchError::DataUnavailable {
            symbol: ticker.to_string(),
            reason: result_error(&body, "quoteSummary"),
        })
    }

    /// Yahoo `quoteType` (EQUITY, ETF, MUTUALFUND, ...)
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn quote_type(&self, ticker: &Ticker) -> Result<String> {
        let summary = self.quote_summary(ticker, &["quoteType"]).await?;
        text(&summary, "quoteType", "quoteType").ok_or_else(|| WatchError::DataUnavailable {
            symbol: ticker.to_string(),
            reason: "quoteType missing".to_string(),
        })
    }

    /// Company or fund fundamentals
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals> {
        let summary = self.quote_summary(ticker, FUNDAMENTAL_MODULES).await?;
        Ok(parse_fundamentals(&summary))
    }

    /// ETF top holdings
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn holdings(&self, ticker: &Ticker, limit: usize) -> Result<Holdings> {
        let summary = self.quote_summary(ticker, &["topHoldings"]).await?;
        Ok(parse_holdings(&summary, limit))
    }

    /// ETF sector weights
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn sector_allocation(&self, ticker: &Ticker) -> Result<SectorAllocation> {
        let summary = self.quote_summary(ticker, &["topHoldings"]).await?;
        Ok(parse_sector_allocation(&summary))
    }

    /// Underlying price and the chains of the first `max_expirations` expirations
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn option_chains(
        &self,
        ticker: &Ticker,
        max_expirations: usize,
    ) -> Result<(Option<f64>, Vec<OptionChain>)> {
        let crumb = self.crumb().await?;
        let url = format!("{OPTIONS_URL}/{ticker}");

        let first: Value = get_json(
            self.http.get(&url).query(&[("crumb", crumb.as_str())]),
            "Yahoo Finance",
        )
        .await?;
        let result = first_result(&first, "optionChain").ok_or_else(|| {
            WatchError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: result_error(&first, "optionChain"),
            }
        })?;

        let expirations: Vec<i64> = result
            .get("expirationDates")
            .and_then(Value::as_array)
            .map(|dates| dates.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();
        if expirations.is_empty() {
            return Err(WatchError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "no option expirations".to_string(),
            });
        }

        let price = result
            .get("quote")
            .and_then(|q| q.get("regularMarketPrice"))
            .and_then(number);

        // The undated call already carries the nearest expiration
        let mut chains = parse_option_chains(&result);
        let remaining = max_expirations.saturating_sub(chains.len());
        for date in expirations.iter().skip(chains.len()).take(remaining) {
            let body: Value = get_json(
                self.http
                    .get(&url)
                    .query(&[("crumb", crumb.clone()), ("date", date.to_string())]),
                "Yahoo Finance",
            )
            .await?;
            if let Some(result) = first_result(&body, "optionChain") {
                chains.extend(parse_option_chains(&result));
            }
        }
        chains.truncate(max_expirations);

        Ok((price, chains))
    }
}

fn first_result(body: &Value, root: &str) -> Option<Value> {
    body.get(root)?.get("result")?.as_array()?.first().cloned()
}

fn result_error(body: &Value, root: &str) -> String {
    body.get(root)
        .and_then(|r| r.get("error"))
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
        .unwrap_or("empty result")
        .to_string()
}

/// Numbers arrive either bare or as `{ "raw": 1.0, "fmt": "1.00" }`
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get("raw").and_then(Value::as_f64),
        _ => None,
    }
}

fn num(summary: &Value, module: &str, key: &str) -> Option<f64> {
    summary.get(module)?.get(key).and_then(number)
}

fn int(summary: &Value, module: &str, key: &str) -> Option<u64> {
    num(summary, module, key).filter(|v| *v >= 0.0).map(|v| v as u64)
}

fn text(summary: &Value, module: &str, key: &str) -> Option<String> {
    summary
        .get(module)?
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_fundamentals(s: &Value) -> Fundamentals {
    Fundamentals {
        profile: Profile {
            name: text(s, "price", "longName").or_else(|| text(s, "price", "shortName")),
            sector: text(s, "assetProfile", "sector"),
            industry: text(s, "assetProfile", "industry"),
            country: text(s, "assetProfile", "country"),
            description: text(s, "assetProfile", "longBusinessSummary"),
            category: text(s, "fundProfile", "categoryName"),
            fund_family: text(s, "fundProfile", "family"),
            currency: text(s, "price", "currency"),
            exchange: text(s, "price", "exchangeName"),
        },
        price: PriceInfo {
            price: num(s, "price", "regularMarketPrice"),
            previous_close: num(s, "summaryDetail", "previousClose"),
            day_high: num(s, "summaryDetail", "dayHigh"),
            day_low: num(s, "summaryDetail", "dayLow"),
            volume: int(s, "summaryDetail", "volume"),
            avg_volume: int(s, "summaryDetail", "averageVolume"),
            market_cap: num(s, "summaryDetail", "marketCap"),
            fifty_two_week_high: num(s, "summaryDetail", "fiftyTwoWeekHigh"),
            fifty_two_week_low: num(s, "summaryDetail", "fiftyTwoWeekLow"),
            fifty_two_week_change: num(s, "defaultKeyStatistics", "52WeekChange"),
            fifty_day_average: num(s, "summaryDetail", "fiftyDayAverage"),
            two_hundred_day_average: num(s, "summaryDetail", "twoHundredDayAverage"),
            beta: num(s, "summaryDetail", "beta")
                .or_else(|| num(s, "defaultKeyStatistics", "beta3Year")),
        },
        valuation: Valuation {
            pe_trailing: num(s, "summaryDetail", "trailingPE"),
            pe_forward: num(s, "summaryDetail", "forwardPE"),
            peg_ratio: num(s, "defaultKeyStatistics", "pegRatio"),
            price_to_book: num(s, "defaultKeyStatistics", "priceToBook"),
            price_to_sales: num(s, "summaryDetail", "priceToSalesTrailing12Months"),
            ev_to_ebitda: num(s, "defaultKeyStatistics", "enterpriseToEbitda"),
            ev_to_revenue: num(s, "defaultKeyStatistics", "enterpriseToRevenue"),
        },
        profitability: Profitability {
            eps_trailing: num(s, "defaultKeyStatistics", "trailingEps"),
            eps_forward: num(s, "defaultKeyStatistics", "forwardEps"),
            gross_margin: num(s, "financialData", "grossMargins"),
            operating_margin: num(s, "financialData", "operatingMargins"),
            profit_margin: num(s, "financialData", "profitMargins"),
            roe: num(s, "financialData", "returnOnEquity"),
            roa: num(s, "financialData", "returnOnAssets"),
        },
        debt: Debt {
            total_debt: num(s, "financialData", "totalDebt"),
            total_cash: num(s, "financialData", "totalCash"),
            debt_to_equity: num(s, "financialData", "debtToEquity"),
            current_ratio: num(s, "financialData", "currentRatio"),
            quick_ratio: num(s, "financialData", "quickRatio"),
        },
        dividends: Dividends {
            dividend_rate: num(s, "summaryDetail", "dividendRate"),
            dividend_yield: num(s, "summaryDetail", "dividendYield")
                .or_else(|| num(s, "summaryDetail", "yield")),
            payout_ratio: num(s, "summaryDetail", "payoutRatio"),
            five_year_avg_dividend_yield: num(s, "summaryDetail", "fiveYearAvgDividendYield"),
        },
        growth: Growth {
            earnings_growth: num(s, "financialData", "earningsGrowth"),
            revenue_growth: num(s, "financialData", "revenueGrowth"),
            earnings_quarterly_growth: num(s, "defaultKeyStatistics", "earningsQuarterlyGrowth"),
        },
        analyst: AnalystConsensus {
            recommendation_key: text(s, "financialData", "recommendationKey"),
            recommendation_mean: num(s, "financialData", "recommendationMean"),
            target_high_price: num(s, "financialData", "targetHighPrice"),
            target_low_price: num(s, "financialData", "targetLowPrice"),
            target_mean_price: num(s, "financialData", "targetMeanPrice"),
            number_of_analysts: int(s, "financialData", "numberOfAnalystOpinions")
                .and_then(|n| u32::try_from(n).ok()),
        },
        fund: FundMetrics {
            expense_ratio: s
                .get("fundProfile")
                .and_then(|p| p.get("feesExpensesInvestment"))
                .and_then(|f| f.get("annualReportExpenseRatio"))
                .and_then(number),
            total_assets: num(s, "summaryDetail", "totalAssets"),
            ytd_return: num(s, "defaultKeyStatistics", "ytdReturn"),
            three_year_return: num(s, "defaultKeyStatistics", "threeYearAverageReturn"),
            five_year_return: num(s, "defaultKeyStatistics", "fiveYearAverageReturn"),
            nav_price: num(s, "summaryDetail", "navPrice"),
        },
    }
}

fn parse_holdings(s: &Value, limit: usize) -> Holdings {
    let top: Vec<Holding> = s
        .get("topHoldings")
        .and_then(|t| t.get("holdings"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let symbol = item.get("symbol")?.as_str()?.trim().to_string();
                    if symbol.is_empty() {
                        return None;
                    }
                    Some(Holding {
                        symbol,
                        name: item
                            .get("holdingName")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        weight_pct: item.get("holdingPercent").and_then(number).unwrap_or(0.0)
                            * 100.0,
                    })
                })
                .take(limit)
                .collect()
        })
        .unwrap_or_default();

    Holdings {
        count: top.len(),
        top,
    }
}

/// "realestate" -> "Realestate", "consumer_cyclical" -> "Consumer Cyclical"
fn title_case(raw: &str) -> String {
    raw.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_sector_allocation(s: &Value) -> SectorAllocation {
    let mut sectors: Vec<SectorWeight> = s
        .get("topHoldings")
        .and_then(|t| t.get("sectorWeightings"))
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_object)
                .flat_map(|map| map.iter())
                .filter_map(|(sector, weight)| {
                    Some(SectorWeight {
                        sector: title_case(sector),
                        weight_pct: (number(weight)? * 10_000.0).round() / 100.0,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    sectors.sort_by(|a, b| b.weight_pct.total_cmp(&a.weight_pct));
    SectorAllocation { sectors }
}

fn parse_contracts(chain: &Value, key: &str, kind: OptionKind) -> Vec<OptionContract> {
    chain
        .get(key)
        .and_then(Value::as_array)
        .map(|contracts| {
            contracts
                .iter()
                .filter_map(|c| {
                    Some(OptionContract {
                        kind,
                        strike: c.get("strike").and_then(number)?,
                        volume: c.get("volume").and_then(number).unwrap_or(0.0).max(0.0) as u64,
                        open_interest: c
                            .get("openInterest")
                            .and_then(number)
                            .unwrap_or(0.0)
                            .max(0.0) as u64,
                        implied_volatility: c
                            .get("impliedVolatility")
                            .and_then(number)
                            .filter(|iv| iv.is_finite()),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_option_chains(result: &Value) -> Vec<OptionChain> {
    result
        .get("options")
        .and_then(Value::as_array)
        .map(|chains| {
            chains
                .iter()
                .map(|chain| {
                    let mut contracts = parse_contracts(chain, "calls", OptionKind::Call);
                    contracts.extend(parse_contracts(chain, "puts", OptionKind::Put));
                    OptionChain {
                        expiration: chain
                            .get("expirationDate")
                            .and_then(Value::as_i64)
                            .and_then(|t| DateTime::from_timestamp(t, 0)),
                        contracts,
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_accepts_raw_objects() {
        assert_eq!(number(&json!(1.5)), Some(1.5));
        assert_eq!(number(&json!({"raw": 2.0, "fmt": "2.00"})), Some(2.0));
        assert_eq!(number(&json!({})), None);
        assert_eq!(number(&json!("3")), None);
    }

    #[test]
    fn test_parse_fundamentals_with_missing_modules() {
        let summary = json!({
            "price": {"longName": "Apple Inc.", "regularMarketPrice": {"raw": 190.5}, "currency": "USD"},
            "summaryDetail": {"trailingPE": {"raw": 29.1}, "volume": {"raw": 51234567}},
            "financialData": {"recommendationKey": "buy", "numberOfAnalystOpinions": {"raw": 38}}
        });

        let fundamentals = parse_fundamentals(&summary);
        assert_eq!(fundamentals.profile.name.as_deref(), Some("Apple Inc."));
        assert_eq!(fundamentals.price.price, Some(190.5));
        assert_eq!(fundamentals.price.volume, Some(51_234_567));
        assert_eq!(fundamentals.valuation.pe_trailing, Some(29.1));
        assert_eq!(fundamentals.analyst.recommendation_key.as_deref(), Some("buy"));
        assert_eq!(fundamentals.analyst.number_of_analysts, Some(38));
        // Modules Yahoo left out stay empty
        assert!(fundamentals.profile.sector.is_none());
        assert!(fundamentals.debt.total_debt.is_none());
        assert!(fundamentals.fund.expense_ratio.is_none());
    }

    #[test]
    fn test_parse_holdings_and_sectors() {
        let summary = json!({
            "topHoldings": {
                "holdings": [
                    {"symbol": "AAPL", "holdingName": "Apple Inc", "holdingPercent": {"raw": 0.071}},
                    {"symbol": "MSFT", "holdingName": "Microsoft Corp", "holdingPercent": {"raw": 0.065}},
                    {"symbol": "", "holdingPercent": {"raw": 0.01}}
                ],
                "sectorWeightings": [
                    {"realestate": {"raw": 0.0234}},
                    {"technology": {"raw": 0.3012}},
                    {"consumer_cyclical": {"raw": 0.1}}
                ]
            }
        });

        let holdings = parse_holdings(&summary, 10);
        assert_eq!(holdings.count, 2);
        assert_eq!(holdings.top[0].symbol, "AAPL");
        assert!((holdings.top[0].weight_pct - 7.1).abs() < 1e-9);

        let allocation = parse_sector_allocation(&summary);
        assert_eq!(allocation.sectors[0].sector, "Technology");
        assert!((allocation.sectors[0].weight_pct - 30.12).abs() < 1e-9);
        assert!(allocation.sectors.iter().any(|s| s.sector == "Consumer Cyclical"));
    }

    #[test]
    fn test_parse_option_chains() {
        let result = json!({
            "expirationDates": [1_700_000_000],
            "quote": {"regularMarketPrice": 100.0},
            "options": [{
                "expirationDate": 1_700_000_000,
                "calls": [{"strike": 100.0, "volume": 500, "openInterest": 10, "impliedVolatility": 0.3}],
                "puts": [{"strike": 95.0, "openInterest": 40}]
            }]
        });

        let chains = parse_option_chains(&result);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].contracts.len(), 2);
        assert_eq!(chains[0].contracts[0].kind, OptionKind::Call);
        assert_eq!(chains[0].contracts[1].volume, 0);
        assert!(chains[0].expiration.is_some());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("realestate"), "Realestate");
        assert_eq!(title_case("consumer_cyclical"), "Consumer Cyclical");
        assert_eq!(title_case("TECHNOLOGY"), "Technology");
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_daily_candles() {
        let client = YahooFinanceClient::new(Duration::from_secs(30)).unwrap();
        let ticker = Ticker::parse("AAPL").unwrap();
        let candles = client.candles(&ticker, Timeframe::Daily).await.unwrap();
        assert!(candles.len() > 200);
    }
}
