// =============================================================================
// Commodity Channel Index (CCI)
// =============================================================================
//
//   typicalPrice_t = (high_t + low_t + close_t) / 3
//   CCI_t = (typicalPrice_t - SMA(typicalPrice, period)) / (0.015 * meanDeviation)
//
// where meanDeviation is the mean absolute deviation of typicalPrice from its
// SMA over the same window. Unbounded, but conventionally ranges roughly
// between -200 and 200.
// =============================================================================

use crate::market_data::Candle;

use super::catalog::DIRECTIONAL_CATALOG;
use super::result::{clamp_score, round_score, signal_from_score, IndicatorResult};

/// Compute the CCI series for the given period.
pub fn calculate_cci(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period {
        return Vec::new();
    }

    let typical: Vec<f64> = candles
        .iter()
        .map(|c| (c.high + c.low + c.close) / 3.0)
        .collect();

    (0..=typical.len() - period)
        .map(|i| {
            let window = &typical[i..i + period];
            let sma = window.iter().sum::<f64>() / period as f64;
            let mean_dev = window.iter().map(|v| (v - sma).abs()).sum::<f64>() / period as f64;
            if mean_dev.abs() < f64::EPSILON {
                0.0
            } else {
                (window[window.len() - 1] - sma) / (0.015 * mean_dev)
            }
        })
        .collect()
}

fn max_score() -> i32 {
    DIRECTIONAL_CATALOG
        .iter()
        .find(|s| s.name == "cci")
        .map(|s| s.max_score)
        .unwrap_or(32)
}

/// Score CCI, evaluated in order:
///   1. `|CCI| > 200`: `weight`, signed.
///   2. `|CCI| > 100`: `weight * 0.625`, signed.
///   3. A zero-line cross adds an additive `+/-5` bonus on top.
pub fn score(candles: &[Candle], period: usize) -> IndicatorResult {
    let series = calculate_cci(candles, period);
    if series.len() < 2 {
        return IndicatorResult::neutral();
    }

    let cur = *series.last().unwrap();
    let prev = series[series.len() - 2];
    let weight = max_score() as f64;

    let base = if cur.abs() > 200.0 {
        weight * cur.signum()
    } else if cur.abs() > 100.0 {
        weight * 0.625 * cur.signum()
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
