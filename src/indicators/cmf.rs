// =============================================================================
// Chaikin Money Flow (CMF)
// =============================================================================
//
//   mf_multiplier_t = ((close_t - low_t) - (high_t - close_t)) / (high_t - low_t)
//   mf_volume_t     = mf_multiplier_t * volume_t
//   CMF             = sum(mf_volume, period) / sum(volume, period)
//
// Bounded in [-1, 1] in practice (can exceed slightly with degenerate bars).
// =============================================================================

use crate::market_data::Candle;

use super::catalog::DIRECTIONAL_CATALOG;
use super::result::{clamp_score, round_score, signal_from_score, IndicatorResult};

/// Compute the CMF series for the given period.
pub fn calculate_cmf(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period {
        return Vec::new();
    }

    let mf_volume: Vec<f64> = candles
        .iter()
        .map(|c| {
            let range = c.high - c.low;
            let multiplier = if range.abs() < f64::EPSILON {
                0.0
            } else {
                ((c.close - c.low) - (c.high - c.close)) / range
            };
            multiplier * c.volume
        })
        .collect();
    let volume: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    (0..=candles.len() - period)
        .map(|i| {
            let mfv_sum: f64 = mf_volume[i..i + period].iter().sum();
            let vol_sum: f64 = volume[i..i + period].iter().sum();
            if vol_sum.abs() < f64::EPSILON {
                0.0
            } else {
                mfv_sum / vol_sum
            }
        })
        .collect()
}

fn max_score() -> i32 {
    DIRECTIONAL_CATALOG
        .iter()
        .find(|s| s.name == "cmf")
        .map(|s| s.max_score)
        .unwrap_or(38)
}

/// Score CMF, evaluated in order:
///   1. `|CMF| > 0.1`: `weight`, signed.
///   2. Same sign as the previous reading (weaker continuation): `weight * 0.53`.
///   3. A zero-line cross adds an additive `+/-5` bonus on top.
pub fn score(candles: &[Candle], period: usize) -> IndicatorResult {
    let series = calculate_cmf(candles, period);
    if series.len() < 2 {
        return IndicatorResult::neutral();
    }

    let cur = *series.last().unwrap();
    let prev = series[series.len() - 2];
    let weight = max_score() as f64;

    let base = if cur.abs() > 0.1 {
        weight * cur.signum()
    } else if cur != 0.0 && cur.signum() == prev.signum() {
        weight * 0.53 * cur.signum()
    } else {
        0.0
    };

    let crossed = cur != 0.0 && cur.signum() != prev.signum();
    let bonus = if crossed { 5.0 * cur.signum() } else { 0.0 };

    let score = clamp_score(round_score(base + bonus), max_score());
    IndicatorResult {
        value: cur,
        score,
        signal: signal_from_score(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            open_time: 0,
            close_time: 0,
            open: close,
            high,
            low,
            close,
            volume,
            quote_volume: volume,
            trades_count: 1,
            taker_buy_volume: volume / 2.0,
            taker_buy_quote_volume: volume / 2.0,
            is_closed: true,
        }
    }

    #[test]
    fn cmf_bullish_candle_is_positive() {
        // Close near the high -> positive money flow multiplier.
        let candles = vec![candle(110.0, 90.0, 108.0, 100.0); 20];
        let series = calculate_cmf(&candles, 20);
        assert_eq!(series.len(), 1);
        assert!(series[0] > 0.0);
    }

    #[test]
    fn cmf_bearish_candle_is_negative() {
        let candles = vec![candle(110.0, 90.0, 92.0, 100.0); 20];
        let series = calculate_cmf(&candles, 20);
        assert!(series[0] < 0.0);
    }

    #[test]
    fn cmf_insufficient_data() {
        let candles = vec![candle(101.0, 99.0, 100.0, 10.0); 5];
        assert!(calculate_cmf(&candles, 20).is_empty());
    }

    #[test]
    fn score_insufficient_data_is_neutral() {
        let candles = vec![candle(101.0, 99.0, 100.0, 10.0); 5];
        let r = score(&candles, 20);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn score_bounded_by_max_score() {
        let mut candles = vec![candle(110.0, 90.0, 95.0, 100.0); 20];
        candles.push(candle(110.0, 90.0, 108.0, 100.0));
        let r = score(&candles, 20);
        assert!(r.score.abs() <= max_score());
    }
}
