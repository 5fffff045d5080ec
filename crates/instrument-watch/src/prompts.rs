//! Analysis prompt templates
//!
//! Each section of a record is pre-rendered to plain text and handed to a
//! kind-specific `minijinja` template. Sections that could not be fetched
//! appear as `unavailable: <reason>` so the model can say what is missing
//! instead of inventing it.

use crate::error::Result;
use crate::record::{
    Fundamentals, Holdings, InstrumentRecord, MultiTimeframe, NewsBundle, OptionsVolatility,
    Section, SectorAllocation, SentimentSnapshot, TechnicalSummary,
};
use crate::ticker::InstrumentKind;
use minijinja::Environment;
use serde::Serialize;
use std::fmt::Write as _;

/// Messages quoted from the sentiment stream
const SENTIMENT_SAMPLES: usize = 5;
/// Characters of the business description kept in the prompt
const DESCRIPTION_CHARS: usize = 600;

const STOCK_TEMPLATE: &str = r"You are a financial advisor who explains investing in plain language.
Your readers are not finance experts, so:
- explain each technical term the first time you use it
- prefer simple analogies over jargon
- be direct about the risks

Analyze **{{ ticker }}**{% if name %} ({{ name }}){% endif %} and write a complete investment report.

## Company and market data
{{ fundamentals }}

## Technical indicators (daily)
{{ technicals }}

## Multi-timeframe view
{{ multi_timeframe }}

## Options and implied volatility
{{ options }}

## Social sentiment (StockTwits)
{{ sentiment }}

## Recent news
{{ news }}

Write the report with these parts:
1. **Executive summary**: what the company does and the overall picture in 3-4 sentences.
2. **Valuation**: is the price reasonable relative to earnings, sales and peers?
3. **Financial health**: profitability, debt and cash.
4. **Technical picture**: trend, momentum and where the timeframes agree or disagree.
5. **Options and sentiment**: what traders are positioning for.
6. **News impact**: which headlines matter and why.
7. **Risks**: the main things that could go wrong.
8. **Verdict**: BUY, HOLD or SELL for short, medium and long term, with a one-line reason each.

If a section above is marked unavailable, say so briefly and do not invent numbers for it.
This is educational content, not personalized financial advice.
";

const ETF_TEMPLATE: &str = r"You are a financial advisor who explains investing in plain language.
Your readers are not finance experts, so explain what an ETF is doing with their money
and define each term the first time you use it.

Analyze the ETF **{{ ticker }}**{% if name %} ({{ name }}){% endif %} and write a complete investment report.

## Fund and market data
{{ fundamentals }}

## Top holdings
{{ holdings }}

## Sector allocation
{{ sector_allocation }}

## Technical indicators (daily)
{{ technicals }}

## Multi-timeframe view
{{ multi_timeframe }}

## Options and implied volatility
{{ options }}

## Social sentiment (StockTwits)
{{ sentiment }}

## Recent news
{{ news }}

Write the report with these parts:
1. **What this ETF is**: strategy, index tracked and who it suits.
2. **Costs and size**: expense ratio and assets, and why they matter.
3. **Concentration**: how dependent the fund is on its largest holdings and sectors.
4. **Performance**: recent and multi-year returns in context.
5. **Technical picture**: trend, momentum and where the timeframes agree or disagree.
6. **Options, sentiment and news**: what the market is currently focused on.
7. **Risks**: the main things that could go wrong.
8. **Verdict**: BUY, HOLD or SELL for short, medium and long term, with a one-line reason each.

If a section above is marked unavailable, say so briefly and do not invent numbers for it.
This is educational content, not personalized financial advice.
";

#[derive(Serialize)]
struct PromptVars<'a> {
    ticker: &'a str,
    name: Option<&'a str>,
    fundamentals: String,
    technicals: String,
    multi_timeframe: String,
    options: String,
    sentiment: String,
    news: String,
    holdings: String,
    sector_allocation: String,
}

/// Render the analysis prompt for `record`
pub fn analysis_prompt(record: &InstrumentRecord) -> Result<String> {
    let template = match record.kind {
        InstrumentKind::Stock => STOCK_TEMPLATE,
        InstrumentKind::Etf => ETF_TEMPLATE,
    };

    let vars = PromptVars {
        ticker: record.ticker.as_str(),
        name: record
            .fundamentals
            .available()
            .and_then(|f| f.profile.name.as_deref()),
        fundamentals: render(&record.fundamentals, |f| fundamentals_text(f, record.kind)),
        technicals: render(&record.technicals, technicals_text),
        multi_timeframe: render(&record.multi_timeframe, multi_timeframe_text),
        options: render(&record.options, options_text),
        sentiment: render(&record.sentiment, sentiment_text),
        news: render(&record.news, news_text),
        holdings: render(&record.holdings, holdings_text),
        sector_allocation: render(&record.sector_allocation, sectors_text),
    };

    let env = Environment::new();
    let value = minijinja::value::Value::from_serialize(&vars);
    Ok(env.render_str(template, value)?)
}

fn render<T>(section: &Section<T>, text: impl FnOnce(&T) -> String) -> String {
    match section {
        Section::Available(value) => text(value),
        Section::Unavailable { reason } => format!("unavailable: {reason}"),
        Section::NotApplicable => "not applicable".to_string(),
    }
}

fn num(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

/// Ratio reported as a fraction, shown as a percentage
fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn money(value: Option<f64>) -> String {
    match value {
        None => "N/A".to_string(),
        Some(v) if v.abs() >= 1e12 => format!("${:.2}T", v / 1e12),
        Some(v) if v.abs() >= 1e9 => format!("${:.2}B", v / 1e9),
        Some(v) if v.abs() >= 1e6 => format!("${:.2}M", v / 1e6),
        Some(v) => format!("${v:.2}"),
    }
}

fn text(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

fn fundamentals_text(f: &Fundamentals, kind: InstrumentKind) -> String {
    let mut out = String::new();
    let p = &f.profile;
    let price = &f.price;

    let _ = writeln!(out, "- Name: {}", text(p.name.as_deref()));
    match kind {
        InstrumentKind::Stock => {
            let _ = writeln!(out, "- Sector: {}", text(p.sector.as_deref()));
            let _ = writeln!(out, "- Industry: {}", text(p.industry.as_deref()));
            let _ = writeln!(out, "- Country: {}", text(p.country.as_deref()));
        }
        InstrumentKind::Etf => {
            let _ = writeln!(out, "- Category: {}", text(p.category.as_deref()));
            let _ = writeln!(out, "- Fund family: {}", text(p.fund_family.as_deref()));
        }
    }
    if let Some(description) = p.description.as_deref() {
        let short: String = description.chars().take(DESCRIPTION_CHARS).collect();
        let _ = writeln!(out, "- Description: {short}");
    }

    let _ = writeln!(out, "- Price: {}", num(price.price));
    let _ = writeln!(out, "- Previous close: {}", num(price.previous_close));
    let _ = writeln!(
        out,
        "- Day range: {} - {}",
        num(price.day_low),
        num(price.day_high)
    );
    let _ = writeln!(
        out,
        "- Volume: {} (average {})",
        count(price.volume),
        count(price.avg_volume)
    );
    let _ = writeln!(
        out,
        "- 52-week range: {} - {} (change {})",
        num(price.fifty_two_week_low),
        num(price.fifty_two_week_high),
        pct(price.fifty_two_week_change)
    );
    let _ = writeln!(
        out,
        "- 50/200-day averages: {} / {}",
        num(price.fifty_day_average),
        num(price.two_hundred_day_average)
    );
    let _ = writeln!(out, "- Beta: {}", num(price.beta));

    match kind {
        InstrumentKind::Stock => {
            let v = &f.valuation;
            let pr = &f.profitability;
            let d = &f.debt;
            let a = &f.analyst;
            let _ = writeln!(out, "- Market cap: {}", money(price.market_cap));
            let _ = writeln!(
                out,
                "- P/E trailing / forward: {} / {}",
                num(v.pe_trailing),
                num(v.pe_forward)
            );
            let _ = writeln!(out, "- PEG: {}", num(v.peg_ratio));
            let _ = writeln!(
                out,
                "- Price/book: {}, price/sales: {}, EV/EBITDA: {}",
                num(v.price_to_book),
                num(v.price_to_sales),
                num(v.ev_to_ebitda)
            );
            let _ = writeln!(
                out,
                "- EPS trailing / forward: {} / {}",
                num(pr.eps_trailing),
                num(pr.eps_forward)
            );
            let _ = writeln!(
                out,
                "- Margins gross / operating / net: {} / {} / {}",
                pct(pr.gross_margin),
                pct(pr.operating_margin),
                pct(pr.profit_margin)
            );
            let _ = writeln!(out, "- ROE: {}, ROA: {}", pct(pr.roe), pct(pr.roa));
            let _ = writeln!(
                out,
                "- Debt: {} (cash {}), debt/equity {}, current ratio {}",
                money(d.total_debt),
                money(d.total_cash),
                num(d.debt_to_equity),
                num(d.current_ratio)
            );
            let _ = writeln!(
                out,
                "- Revenue / earnings growth: {} / {}",
                pct(f.growth.revenue_growth),
                pct(f.growth.earnings_growth)
            );
            let _ = writeln!(
                out,
                "- Dividend yield: {}, payout ratio: {}",
                pct(f.dividends.dividend_yield),
                pct(f.dividends.payout_ratio)
            );
            let _ = writeln!(
                out,
                "- Analysts: {} (mean {}, {} analysts), target {} [{} - {}]",
                text(a.recommendation_key.as_deref()),
                num(a.recommendation_mean),
                a.number_of_analysts
                    .map_or_else(|| "N/A".to_string(), |n| n.to_string()),
                num(a.target_mean_price),
                num(a.target_low_price),
                num(a.target_high_price)
            );
        }
        InstrumentKind::Etf => {
            let fund = &f.fund;
            let _ = writeln!(out, "- Total assets: {}", money(fund.total_assets));
            let _ = writeln!(out, "- Expense ratio: {}", pct(fund.expense_ratio));
            let _ = writeln!(out, "- NAV: {}", num(fund.nav_price));
            let _ = writeln!(
                out,
                "- Returns YTD / 3y / 5y: {} / {} / {}",
                pct(fund.ytd_return),
                pct(fund.three_year_return),
                pct(fund.five_year_return)
            );
            let _ = writeln!(out, "- Yield: {}", pct(f.dividends.dividend_yield));
        }
    }
    out
}

fn technicals_text(t: &TechnicalSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "- Signal: {} (buy {}, sell {}, neutral {})",
        t.recommendation, t.buy, t.sell, t.neutral
    );
    let _ = writeln!(out, "- Close: {}", num(t.close));
    let _ = writeln!(out, "- RSI(14): {}", num(t.rsi));
    let _ = writeln!(
        out,
        "- MACD: {} (signal {})",
        num(t.macd),
        num(t.macd_signal)
    );
    for ma in &t.moving_averages {
        let _ = writeln!(
            out,
            "- SMA{0}: {1}, EMA{0}: {2}",
            ma.period,
            num(ma.sma),
            num(ma.ema)
        );
    }
    if let Some(bb) = &t.bollinger {
        let _ = writeln!(
            out,
            "- Bollinger(20): {:.2} / {:.2} / {:.2}",
            bb.lower, bb.middle, bb.upper
        );
    }
    let _ = writeln!(out, "- ATR(14): {}", num(t.atr));
    out
}

fn multi_timeframe_text(m: &MultiTimeframe) -> String {
    let mut out = String::new();
    for reading in &m.readings {
        match (&reading.error, reading.recommendation) {
            (Some(error), _) => {
                let _ = writeln!(out, "- {}: unavailable: {error}", reading.timeframe);
            }
            (None, recommendation) => {
                let _ = writeln!(
                    out,
                    "- {}: {} (buy {}, sell {}, neutral {}), RSI {}, MACD {}",
                    reading.timeframe,
                    recommendation.unwrap_or_default(),
                    reading.buy,
                    reading.sell,
                    reading.neutral,
                    num(reading.rsi),
                    num(reading.macd)
                );
            }
        }
    }
    out
}

fn options_text(o: &OptionsVolatility) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "- Underlying: {}", num(o.underlying_price));
    let _ = writeln!(
        out,
        "- ATM implied volatility: {}",
        o.atm_iv_avg
            .map_or_else(|| "N/A".to_string(), |iv| format!("{iv:.1}%"))
    );
    let _ = writeln!(out, "- Expirations analyzed: {}", o.expirations_used);
    let _ = writeln!(out, "- Unusual contracts: {}", o.unusual_activity_count);
    for c in &o.top_unusual {
        let expiry = c
            .expiration
            .map_or_else(|| "?".to_string(), |d| d.format("%Y-%m-%d").to_string());
        let _ = writeln!(
            out,
            "  - {} {:.2} exp {expiry}: volume {}, OI {}, ratio {}",
            c.kind,
            c.strike,
            c.volume,
            c.open_interest,
            c.ratio
                .map_or_else(|| "n/a".to_string(), |r| format!("{r:.1}"))
        );
    }
    out
}

fn sentiment_text(s: &SentimentSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "- Messages: {}; bullish {:.1}%, bearish {:.1}%, untagged {:.1}%",
        s.messages.len(),
        s.bullish_pct,
        s.bearish_pct,
        s.neutral_pct
    );
    for message in s.messages.iter().take(SENTIMENT_SAMPLES) {
        let body: String = message.body.chars().take(200).collect();
        let _ = writeln!(out, "  - \"{}\"", body.replace('\n', " "));
    }
    out
}

fn news_text(n: &NewsBundle) -> String {
    if n.articles.is_empty() {
        return "No recent news.".to_string();
    }
    match n.summary.as_deref() {
        Some(summary) => format!("Executive summary:\n{summary}\n\nHeadlines:\n{}", n.digest),
        None => n.digest.clone(),
    }
}

fn holdings_text(h: &Holdings) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "- Holdings listed: {}", h.count);
    for holding in &h.top {
        let _ = writeln!(
            out,
            "  - {} {}: {:.2}%",
            holding.symbol,
            holding.name.as_deref().unwrap_or(""),
            holding.weight_pct
        );
    }
    out
}

fn sectors_text(s: &SectorAllocation) -> String {
    let mut out = String::new();
    for sector in &s.sectors {
        let _ = writeln!(out, "- {}: {:.2}%", sector.sector, sector.weight_pct);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Holding, NewsArticle, Profile};
    use crate::ticker::Ticker;
    use chrono::Utc;

    fn record(kind: InstrumentKind) -> InstrumentRecord {
        let fundamentals = Fundamentals {
            profile: Profile {
                name: Some("Apple Inc.".to_string()),
                ..Profile::default()
            },
            ..Fundamentals::default()
        };
        InstrumentRecord {
            ticker: Ticker::parse("AAPL").unwrap(),
            kind,
            fundamentals: Section::Available(fundamentals),
            technicals: Section::Available(TechnicalSummary::default()),
            multi_timeframe: Section::Available(MultiTimeframe::default()),
            options: Section::unavailable("no options data found"),
            sentiment: Section::Available(SentimentSnapshot::default()),
            news: Section::Available(NewsBundle {
                articles: vec![NewsArticle {
                    title: "Apple beats estimates".to_string(),
                    source: "yahoo".to_string(),
                    ..NewsArticle::default()
                }],
                sources: vec!["yahoo".to_string()],
                digest: "1. Apple beats estimates\n".to_string(),
                summary: None,
            }),
            holdings: Section::NotApplicable,
            sector_allocation: Section::NotApplicable,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_stock_prompt() {
        let prompt = analysis_prompt(&record(InstrumentKind::Stock)).unwrap();
        assert!(prompt.contains("**AAPL** (Apple Inc.)"));
        assert!(prompt.contains("unavailable: no options data found"));
        assert!(prompt.contains("1. Apple beats estimates"));
        assert!(prompt.contains("P/E trailing"));
        assert!(!prompt.contains("Top holdings"));
    }

    #[test]
    fn test_etf_prompt_includes_holdings() {
        let mut etf = record(InstrumentKind::Etf);
        etf.holdings = Section::Available(Holdings {
            top: vec![Holding {
                symbol: "MSFT".to_string(),
                name: Some("Microsoft".to_string()),
                weight_pct: 7.25,
            }],
            count: 1,
        });
        etf.sector_allocation = Section::unavailable("timeout");

        let prompt = analysis_prompt(&etf).unwrap();
        assert!(prompt.contains("the ETF **AAPL**"));
        assert!(prompt.contains("MSFT Microsoft: 7.25%"));
        assert!(prompt.contains("## Sector allocation\nunavailable: timeout"));
        assert!(prompt.contains("Expense ratio"));
    }

    #[test]
    fn test_formatting_helpers() {
        assert_eq!(num(None), "N/A");
        assert_eq!(pct(Some(0.253)), "25.30%");
        assert_eq!(money(Some(2.5e12)), "$2.50T");
        assert_eq!(money(Some(3.1e9)), "$3.10B");
    }
}
