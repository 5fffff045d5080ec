//! Options-implied volatility and unusual-activity summary

use crate::api::{OptionChain, OptionContract};
use crate::record::{OptionsVolatility, UnusualContract};

/// Expirations examined, nearest first
pub const MAX_EXPIRATIONS: usize = 3;
/// Strikes within this fraction of the price count as at-the-money
const ATM_BAND: f64 = 0.10;
/// Minimum volume / (open interest + 1) for unusual activity
const UNUSUAL_RATIO: f64 = 2.0;
/// Minimum volume for unusual activity
const UNUSUAL_MIN_VOLUME: u64 = 100;
const TOP_UNUSUAL: usize = 5;

fn is_unusual(contract: &OptionContract) -> bool {
    let ratio = contract.volume as f64 / (contract.open_interest as f64 + 1.0);
    ratio > UNUSUAL_RATIO && contract.volume > UNUSUAL_MIN_VOLUME
}

/// Summarise the first [`MAX_EXPIRATIONS`] chains around `price`
pub fn summarize(price: Option<f64>, chains: &[OptionChain]) -> OptionsVolatility {
    let chains = &chains[..chains.len().min(MAX_EXPIRATIONS)];

    let atm_iv_avg = price.filter(|p| *p > 0.0).and_then(|price| {
        let (low, high) = (price * (1.0 - ATM_BAND), price * (1.0 + ATM_BAND));
        let ivs: Vec<f64> = chains
            .iter()
            .flat_map(|chain| &chain.contracts)
            .filter(|c| c.strike > low && c.strike < high)
            .filter_map(|c| c.implied_volatility)
            .collect();
        if ivs.is_empty() {
            None
        } else {
            Some(ivs.iter().sum::<f64>() / ivs.len() as f64 * 100.0)
        }
    });

    let mut unusual: Vec<UnusualContract> = chains
        .iter()
        .flat_map(|chain| {
            chain
                .contracts
                .iter()
                .filter(|c| is_unusual(c))
                .map(move |c| UnusualContract {
                    kind: c.kind,
                    strike: c.strike,
                    expiration: chain.expiration,
                    volume: c.volume,
                    open_interest: c.open_interest,
                    ratio: (c.open_interest > 0)
                        .then(|| (c.volume as f64 / c.open_interest as f64 * 10.0).round() / 10.0),
                })
        })
        .collect();

    let unusual_activity_count = unusual.len();
    unusual.sort_by(|a, b| b.volume.cmp(&a.volume));
    unusual.truncate(TOP_UNUSUAL);

    OptionsVolatility {
        underlying_price: price,
        atm_iv_avg,
        expirations_used: chains.len(),
        unusual_activity_count,
        top_unusual: unusual,
    }
}
