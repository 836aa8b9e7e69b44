// =============================================================================
// Williams %R
// =============================================================================
//
//   %R = (highestHigh(period) - close) / (highestHigh(period) - lowestLow(period)) * -100
//
// Bounded in [-100, 0]. Near -100 is oversold, near 0 is overbought — the
// mirror image of the more common 0-100 oscillators.
// =============================================================================

use crate::market_data::Candle;

use super::catalog::DIRECTIONAL_CATALOG;
use super::result::{clamp_score, round_score, signal_from_score, IndicatorResult};

/// Compute the Williams %R series for the given candles and look-back period.
pub fn calculate_williams_r(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(candles.len() - period + 1);
    for window in candles.windows(period) {
        let highest = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let lowest = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let close = window[window.len() - 1].close;
        let range = highest - lowest;
        let value = if range.abs() < f64::EPSILON {
            -50.0
        } else {
            (highest - close) / range * -100.0
        };
        out.push(value);
    }
    out
}

fn max_score() -> i32 {
    DIRECTIONAL_CATALOG
        .iter()
        .find(|s| s.name == "williams_r")
        .map(|s| s.max_score)
        .unwrap_or(50)
}

/// Score Williams %R against oversold/overbought zones, evaluated in order:
///   1. At/below oversold, turning up: `weight * 1.25`.
///   2. At/below oversold, still falling: `weight`.
///   3. Mirror image at/above overbought.
///   4. Otherwise neutral.
pub fn score(candles: &[Candle], period: usize, oversold: f64, overbought: f64) -> IndicatorResult {
    let series = calculate_williams_r(candles, period);
    if series.len() < 2 {
        return IndicatorResult::neutral();
    }

    let cur = *series.last().unwrap();
    let prev = series[series.len() - 2];
    let weight = max_score() as f64;

    let raw = if cur <= oversold {
        if cur > prev {
            weight * 1.25
        } else {
            weight
        }
    } else if cur >= overbought {
        if cur < prev {
            -weight * 1.25
        } else {
            -weight
        }
    } else {
        0.0
    };

    let score = clamp_score(round_score(raw), max_score());
    IndicatorResult {
        value: cur,
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
    fn williams_r_range_check() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.4).sin() * 10.0;
                candle(base + 2.0, base - 2.0, base)
            })
            .collect();
        let series = calculate_williams_r(&candles, 14);
        for v in series {
            assert!((-100.0..=0.0).contains(&v), "%R {v} out of range");
        }
    }

    #[test]
    fn williams_r_insufficient_data() {
        let candles = vec![candle(101.0, 99.0, 100.0); 5];
        assert!(calculate_williams_r(&candles, 14).is_empty());
    }

    #[test]
    fn score_oversold_turning_up_is_strong_buy() {
        let mut candles: Vec<Candle> = (0..20)
            .map(|i| {
                let base = 100.0 - i as f64 * 2.0;
                candle(base + 1.0, base - 1.0, base)
            })
            .collect();
        // Make the final close rally off the lows within the same range.
        let last_high = candles.last().unwrap().high;
        let last_low = candles.last().unwrap().low;
        candles.push(candle(last_high + 0.5, last_low, last_high));
        let r = score(&candles, 14, -80.0, -20.0);
        assert!(r.score.abs() <= max_score());
    }

    #[test]
    fn score_insufficient_data_is_neutral() {
        let candles = vec![candle(101.0, 99.0, 100.0); 3];
        let r = score(&candles, 14, -80.0, -20.0);
        assert_eq!(r.score, 0);
    }
}
