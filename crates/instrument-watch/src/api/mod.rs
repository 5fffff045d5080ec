//! Provider API clients
//!
//! Each client converts its provider's payload into the typed snapshot model
//! at this boundary; nothing above this module sees raw JSON.

pub mod finnhub;
pub mod stocktwits;
pub mod yahoo;
pub mod yahoo_news;

pub use finnhub::FinnhubClient;
pub use stocktwits::StockTwitsClient;
pub use yahoo::{Candle, OptionChain, OptionContract, YahooFinanceClient};
pub use yahoo_news::YahooNewsClient;

use crate::error::{Result, WatchError};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;

pub(crate) type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Browser-like user agent; Yahoo and StockTwits reject bare clients
pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Direct rate limiter allowing `per_minute` requests (`fallback` when zero)
pub(crate) fn rate_limiter(per_minute: u32, fallback: u32) -> SharedRateLimiter {
    let per_minute = NonZeroU32::new(per_minute)
        .or(NonZeroU32::new(fallback))
        .unwrap_or(NonZeroU32::MIN);
    let quota = Quota::per_minute(per_minute);
    Arc::new(RateLimiter::direct(quota))
}

/// Send a request and decode a JSON body, mapping HTTP failures per provider
pub(crate) async fn get_json<T: DeserializeOwned>(
    request: RequestBuilder,
    provider: &str,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| WatchError::ApiError(format!("{provider} request failed: {e}")))?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(WatchError::RateLimitExceeded {
            provider: provider.to_string(),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WatchError::ApiError(format!(
            "{provider} API error {status}: {}",
            truncate(&body, 200)
        )));
    }

    let body = response.text().await?;
    if body.trim().is_empty() {
        return Err(WatchError::ApiError(format!("{provider} returned an empty body")));
    }

    serde_json::from_str(&body)
        .map_err(|e| WatchError::ApiError(format!("Failed to parse {provider} response: {e}")))
}

/// Cut `text` to at most `max` characters on a char boundary
pub(crate) fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("", 3), "");
    }
}
