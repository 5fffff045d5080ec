//! Ticker symbols and instrument kinds

use crate::error::{Result, WatchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper-case instrument symbol, the cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Normalise a raw symbol: trim, upper-case and check the character set
    ///
    /// Accepts letters, digits and `.`, `-`, `^`, `=` (share classes, indices
    /// and futures such as `BRK.B`, `^GSPC`, `ES=F`).
    pub fn parse(raw: &str) -> Result<Self> {
        let symbol = raw.trim().to_uppercase();

        if symbol.is_empty() {
            return Err(WatchError::InvalidSymbol("empty ticker".to_string()));
        }

        if let Some(bad) = symbol
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')))
        {
            return Err(WatchError::InvalidSymbol(format!(
                "{symbol} (unexpected character {bad:?})"
            )));
        }

        Ok(Self(symbol))
    }

    /// The normalised symbol
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Ticker {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = WatchError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

/// Instrument classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentKind {
    /// Common stock, the fallback when classification fails
    #[default]
    Stock,
    /// Exchange-traded fund
    Etf,
}

impl InstrumentKind {
    /// Map a Yahoo `quoteType` value to a kind
    pub fn from_quote_type(quote_type: &str) -> Self {
        if quote_type.trim().eq_ignore_ascii_case("ETF") {
            Self::Etf
        } else {
            Self::Stock
        }
    }

    /// Whether holdings and sector allocation apply
    pub fn is_etf(self) -> bool {
        self == Self::Etf
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stock => write!(f, "STOCK"),
            Self::Etf => write!(f, "ETF"),
        }
    }
}
