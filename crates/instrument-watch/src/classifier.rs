//! STOCK / ETF classification

use crate::provider::DataProvider;
use crate::ticker::{InstrumentKind, Ticker};
use tracing::{debug, warn};

/// Classify `ticker` from its metadata
///
/// Never fails: when the lookup errors the instrument is treated as a stock
/// and the failure is logged.
pub async fn classify(provider: &dyn DataProvider, ticker: &Ticker) -> InstrumentKind {
    match provider.quote_type(ticker).await {
        Ok(quote_type) => {
            let kind = InstrumentKind::from_quote_type(&quote_type);
            debug!(ticker = %ticker, quote_type = %quote_type, %kind, "Classified instrument");
            kind
        }
        Err(e) => {
            warn!(
                ticker = %ticker,
                error = %e,
                "Classification failed, defaulting to STOCK"
            );
            InstrumentKind::Stock
        }
    }
}
