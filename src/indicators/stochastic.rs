// =============================================================================
// Stochastic Oscillator
// =============================================================================
//
//   %K = (close - lowestLow(period)) / (highestHigh(period) - lowestLow(period)) * 100
//   %D = SMA(%K, d_period)
//
// Same evaluation shape as StochRSI (extreme-zone cross vs. extreme-zone
// hold), but applied to raw price rather than RSI, with its own weight and
// moderate-zone fraction.
// =============================================================================

use crate::market_data::Candle;

use super::catalog::DIRECTIONAL_CATALOG;
use super::result::{clamp_score, round_score, signal_from_score, IndicatorResult};

fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    (0..=values.len() - period)
        .map(|i| values[i..i + period].iter().sum::<f64>() / period as f64)
        .collect()
}

/// Compute the raw %K series (0-100).
pub fn calculate_k(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period {
        return Vec::new();
    }
    candles
        .windows(period)
        .map(|window| {
            let highest = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
            let lowest = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
            let close = window[window.len() - 1].close;
            let range = highest - lowest;
            if range.abs() < f64::EPSILON {
                50.0
            } else {
                (close - lowest) / range * 100.0
            }
        })
        .collect()
}

fn max_score() -> i32 {
    DIRECTIONAL_CATALOG
        .iter()
        .find(|s| s.name == "stochastic")
        .map(|s| s.max_score)
        .unwrap_or(36)
}

/// Award weight for a fresh extreme-zone cross. Half of `max_score`, which is
/// only the clamp ceiling, not the base weight, for this indicator.
const BASE_WEIGHT: f64 = 18.0;

/// Moderate-zone fraction applied when sitting in an extreme zone without a
/// fresh %K/%D cross.
const MODERATE_ZONE_FRACTION: f64 = 0.56;

/// Score the Stochastic Oscillator, evaluated in order:
///   1. %K/%D cross while in the extreme zone: `weight`.
///   2. Sitting in the extreme zone without a fresh cross: `weight * 0.56`.
///   3. Otherwise neutral.
pub fn score(
    candles: &[Candle],
    k_period: usize,
    d_period: usize,
    oversold: f64,
    overbought: f64,
) -> IndicatorResult {
    let k_series = calculate_k(candles, k_period);
    let d_series = sma(&k_series, d_period);

    if k_series.len() < 2 || d_series.len() < 2 {
        return IndicatorResult::neutral();
    }

    let k_cur = *k_series.last().unwrap();
    let k_prev = k_series[k_series.len() - 2];
    let d_cur = *d_series.last().unwrap();
    let d_prev = d_series[d_series.len() - 2];

    let weight = BASE_WEIGHT;
    let oversold_zone = k_cur <= oversold;
    let overbought_zone = k_cur >= overbought;
    let bullish_cross = k_prev <= d_prev && k_cur > d_cur;
    let bearish_cross = k_prev >= d_prev && k_cur < d_cur;

    let raw = if oversold_zone && bullish_cross {
        weight
    } else if overbought_zone && bearish_cross {
        -weight
    } else if oversold_zone {
        weight * MODERATE_ZONE_FRACTION
    } else if overbought_zone {
        -weight * MODERATE_ZONE_FRACTION
    } else {
        0.0
    };

    let score = clamp_score(round_score(raw), max_score());
    IndicatorResult {
        value: k_cur,
        score,
        signal: signal_from_score(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(high: f64, low: f64, close: f64) -> Candle {
        Candle {
            open_time: 0,
            close_time: 0,
            open: close,
            high,
            low,
            close,
            volume: 1.0,
            quote_volume: 1.0,
            trades_count: 1,
            taker_buy_volume: 1.0,
            taker_buy_quote_volume: 1.0,
            is_closed: true,
        }
    }

    #[test]
    fn calculate_k_range_check() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.3).sin() * 10.0;
                candle(base + 2.0, base - 2.0, base)
            })
            .collect();
        let series = calculate_k(&candles, 14);
        for v in series {
            assert!((0.0..=100.0).contains(&v), "%K {v} out of range");
        }
    }

    #[test]
    fn calculate_k_insufficient_data() {
        let candles = vec![candle(101.0, 99.0, 100.0); 5];
        assert!(calculate_k(&candles, 14).is_empty());
    }

    #[test]
    fn score_insufficient_data_is_neutral() {
        let candles = vec![candle(101.0, 99.0, 100.0); 3];
        let r = score(&candles, 14, 3, 20.0, 80.0);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn score_bounded_by_max_score() {
        let candles: Vec<Candle> = (0..40)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.3).sin() * 10.0;
                candle(base + 2.0, base - 2.0, base)
            })
            .collect();
        let r = score(&candles, 14, 3, 20.0, 80.0);
        assert!(r.score.abs() <= max_score());
    }

    #[test]
    fn oversold_cross_awards_base_weight_not_clamp_ceiling() {
        let mut closes: Vec<f64> = (0..40).map(|i| 200.0 - i as f64 * 2.0).collect();
        closes.push(closes.last().unwrap() + 15.0);
        closes.push(closes.last().unwrap() + 15.0);
        let candles: Vec<Candle> = closes.iter().map(|&c| candle(c + 1.0, c - 1.0, c)).collect();
        let r = score(&candles, 14, 3, 20.0, 80.0);
        assert!(r.score.abs() <= BASE_WEIGHT as i32, "expected |score| <= {BASE_WEIGHT}, got {}", r.score);
    }
}
