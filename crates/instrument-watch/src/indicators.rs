//! Technical indicators and the buy/sell vote built from them

use crate::api::Candle;
use crate::error::{Result, WatchError};
use crate::record::{
    BollingerReading, MovingAverage, Recommendation, TechnicalSummary, Timeframe,
    TimeframeReading,
};
use ta::{
    Next,
    indicators::{
        AverageTrueRange, BollingerBands, ExponentialMovingAverage, RelativeStrengthIndex,
        SimpleMovingAverage,
    },
};

/// Moving-average periods that take part in the vote
pub const MA_PERIODS: [usize; 5] = [10, 20, 50, 100, 200];

const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const BOLLINGER_PERIOD: usize = 20;
const ATR_PERIOD: usize = 14;

fn indicator_err(e: impl std::fmt::Display) -> WatchError {
    WatchError::IndicatorError(e.to_string())
}

/// Running tally of indicator votes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Votes {
    buy: u32,
    sell: u32,
    neutral: u32,
}

impl Votes {
    /// Vote buy when `value` is above `reference`, sell when below
    fn compare(&mut self, value: f64, reference: f64) {
        if value > reference {
            self.buy += 1;
        } else if value < reference {
            self.sell += 1;
        } else {
            self.neutral += 1;
        }
    }

    fn rsi(&mut self, rsi: f64) {
        if rsi < 30.0 {
            self.buy += 1;
        } else if rsi > 70.0 {
            self.sell += 1;
        } else {
            self.neutral += 1;
        }
    }

    fn recommendation(self) -> Recommendation {
        recommend(self.buy, self.sell, self.neutral)
    }
}

/// Aggregate votes into a recommendation
///
/// The score is `(buy - sell) / total`; above 0.5 is a strong buy, above 0.1
/// a buy, and symmetrically for sells.
pub fn recommend(buy: u32, sell: u32, neutral: u32) -> Recommendation {
    let total = buy + sell + neutral;
    if total == 0 {
        return Recommendation::Neutral;
    }

    let score = (f64::from(buy) - f64::from(sell)) / f64::from(total);
    if score > 0.5 {
        Recommendation::StrongBuy
    } else if score > 0.1 {
        Recommendation::Buy
    } else if score < -0.5 {
        Recommendation::StrongSell
    } else if score < -0.1 {
        Recommendation::Sell
    } else {
        Recommendation::Neutral
    }
}

/// Last value of an indicator fed with every close, if enough data exists
fn last_value<I>(mut indicator: I, closes: &[f64], min_len: usize) -> Option<f64>
where
    I: Next<f64, Output = f64>,
{
    if closes.len() < min_len {
        return None;
    }
    closes.iter().map(|&c| indicator.next(c)).last()
}

/// MACD line (EMA12 - EMA26) and its 9-period signal
fn macd(closes: &[f64]) -> Result<Option<(f64, f64)>> {
    if closes.len() < MACD_SLOW + MACD_SIGNAL {
        return Ok(None);
    }

    let mut ema_fast = ExponentialMovingAverage::new(MACD_FAST).map_err(indicator_err)?;
    let mut ema_slow = ExponentialMovingAverage::new(MACD_SLOW).map_err(indicator_err)?;
    let mut signal = ExponentialMovingAverage::new(MACD_SIGNAL).map_err(indicator_err)?;

    let mut last = None;
    for &close in closes {
        let line = ema_fast.next(close) - ema_slow.next(close);
        last = Some((line, signal.next(line)));
    }
    Ok(last)
}

fn rsi(closes: &[f64]) -> Result<Option<f64>> {
    let indicator = RelativeStrengthIndex::new(RSI_PERIOD).map_err(indicator_err)?;
    Ok(last_value(indicator, closes, RSI_PERIOD + 1))
}

fn closes_of(candles: &[Candle]) -> Result<Vec<f64>> {
    if candles.is_empty() {
        return Err(WatchError::IndicatorError("no candles".to_string()));
    }
    Ok(candles.iter().map(|c| c.close).collect())
}

/// Daily indicators with their aggregate vote
pub fn technical_summary(candles: &[Candle]) -> Result<TechnicalSummary> {
    let closes = closes_of(candles)?;
    let close = closes.last().copied();
    let mut votes = Votes::default();

    let mut moving_averages = Vec::with_capacity(MA_PERIODS.len());
    for period in MA_PERIODS {
        let sma = last_value(
            SimpleMovingAverage::new(period).map_err(indicator_err)?,
            &closes,
            period,
        );
        let ema = last_value(
            ExponentialMovingAverage::new(period).map_err(indicator_err)?,
            &closes,
            period,
        );
        if let Some(price) = close {
            for average in [sma, ema].into_iter().flatten() {
                votes.compare(price, average);
            }
        }
        moving_averages.push(MovingAverage { period, sma, ema });
    }

    let rsi = rsi(&closes)?;
    if let Some(value) = rsi {
        votes.rsi(value);
    }

    let macd = macd(&closes)?;
    if let Some((line, signal)) = macd {
        votes.compare(line, signal);
    }

    let bollinger = if closes.len() >= BOLLINGER_PERIOD {
        let mut bb = BollingerBands::new(BOLLINGER_PERIOD, 2.0).map_err(indicator_err)?;
        closes.iter().map(|&c| bb.next(c)).last().map(|out| BollingerReading {
            upper: out.upper,
            middle: out.average,
            lower: out.lower,
        })
    } else {
        None
    };

    let atr = average_true_range(candles)?;

    Ok(TechnicalSummary {
        recommendation: votes.recommendation(),
        buy: votes.buy,
        sell: votes.sell,
        neutral: votes.neutral,
        close,
        rsi,
        macd: macd.map(|(line, _)| line),
        macd_signal: macd.map(|(_, signal)| signal),
        moving_averages,
        bollinger,
        atr,
    })
}

fn average_true_range(candles: &[Candle]) -> Result<Option<f64>> {
    if candles.len() <= ATR_PERIOD {
        return Ok(None);
    }

    let mut atr = AverageTrueRange::new(ATR_PERIOD).map_err(indicator_err)?;
    let mut last = None;
    for candle in candles {
        // Bars the ta crate rejects (low above close and the like) are skipped
        let Ok(bar) = ta::DataItem::builder()
            .open(candle.open)
            .high(candle.high)
            .low(candle.low)
            .close(candle.close)
            .volume(candle.volume as f64)
            .build()
        else {
            continue;
        };
        last = Some(atr.next(&bar));
    }
    Ok(last)
}

/// Compact reading for one timeframe
pub fn timeframe_reading(timeframe: Timeframe, candles: &[Candle]) -> Result<TimeframeReading> {
    let summary = technical_summary(candles)?;
    Ok(TimeframeReading {
        timeframe,
        recommendation: Some(summary.recommendation),
        buy: summary.buy,
        sell: summary.sell,
        neutral: summary.neutral,
        rsi: summary.rsi,
        macd: summary.macd,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candles_from(closes: impl IntoIterator<Item = f64>) -> Vec<Candle> {
        closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| Candle {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 86_400, 0).unwrap(),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000,
            })
            .collect()
    }

    #[test]
    fn test_recommend_thresholds() {
        assert_eq!(recommend(0, 0, 0), Recommendation::Neutral);
        assert_eq!(recommend(10, 0, 0), Recommendation::StrongBuy);
        assert_eq!(recommend(6, 4, 0), Recommendation::Buy);
        assert_eq!(recommend(5, 5, 2), Recommendation::Neutral);
        assert_eq!(recommend(4, 6, 0), Recommendation::Sell);
        assert_eq!(recommend(0, 9, 1), Recommendation::StrongSell);
    }

    #[test]
    fn test_uptrend_votes_buy() {
        let candles = candles_from((1..=250).map(|i| 100.0 + f64::from(i)));
        let summary = technical_summary(&candles).unwrap();

        // Every moving average sits below the latest close
        assert_eq!(summary.moving_averages.len(), MA_PERIODS.len());
        assert!(summary.moving_averages.iter().all(|ma| ma.sma.is_some()));
        assert!(summary.buy >= 10);
        assert!(matches!(
            summary.recommendation,
            Recommendation::StrongBuy | Recommendation::Buy
        ));
        assert!(summary.rsi.unwrap() > 70.0);
        assert!(summary.bollinger.is_some());
        assert!(summary.atr.is_some());
    }

    #[test]
    fn test_downtrend_votes_sell() {
        let candles = candles_from((1..=250).map(|i| 400.0 - f64::from(i)));
        let summary = technical_summary(&candles).unwrap();
        assert!(matches!(
            summary.recommendation,
            Recommendation::StrongSell | Recommendation::Sell
        ));
    }

    #[test]
    fn test_short_history_skips_long_averages() {
        let candles = candles_from((1..=30).map(f64::from));
        let summary = technical_summary(&candles).unwrap();

        let ma200 = summary
            .moving_averages
            .iter()
            .find(|ma| ma.period == 200)
            .unwrap();
        assert!(ma200.sma.is_none());
        assert!(ma200.ema.is_none());
        // 26 + 9 closes are needed for a MACD signal
        assert!(summary.macd.is_none());
        assert!(summary.rsi.is_some());
    }

    #[test]
    fn test_no_candles_is_error() {
        assert!(matches!(
            technical_summary(&[]),
            Err(WatchError::IndicatorError(_))
        ));
    }

    #[test]
    fn test_timeframe_reading() {
        let candles = candles_from((1..=60).map(|i| 50.0 + f64::from(i)));
        let reading = timeframe_reading(Timeframe::Weekly, &candles).unwrap();
        assert_eq!(reading.timeframe, Timeframe::Weekly);
        assert!(reading.recommendation.is_some());
        assert!(reading.error.is_none());
    }
}
