// =============================================================================
// Stochastic RSI (StochRSI)
// =============================================================================
//
// Applies the stochastic oscillator formula to RSI values instead of price,
// producing a more sensitive (and noisier) oscillator bounded in [0, 100].
//
//   StochRSI_t = (RSI_t - min(RSI, period)) / (max(RSI, period) - min(RSI, period)) * 100
//   %K = SMA(StochRSI, k_period)
//   %D = SMA(%K, d_period)
// =============================================================================

use super::catalog::DIRECTIONAL_CATALOG;
use super::result::{clamp_score, round_score, signal_from_score, IndicatorResult};
use super::rsi::calculate_rsi;

fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    (0..=values.len() - period)
        .map(|i| values[i..i + period].iter().sum::<f64>() / period as f64)
        .collect()
}

/// Compute the raw StochRSI series (0-100) from a closes slice.
pub fn calculate_stoch_rsi(closes: &[f64], rsi_period: usize, stoch_period: usize) -> Vec<f64> {
    let rsi = calculate_rsi(closes, rsi_period);
    if rsi.len() < stoch_period {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(rsi.len() - stoch_period + 1);
    for window in rsi.windows(stoch_period) {
        let min = window.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        let value = if range.abs() < f64::EPSILON {
            50.0
        } else {
            (window[window.len() - 1] - min) / range * 100.0
        };
        out.push(value);
    }
    out
}

fn max_score() -> i32 {
    DIRECTIONAL_CATALOG
        .iter()
        .find(|s| s.name == "stoch_rsi")
        .map(|s| s.max_score)
        .unwrap_or(40)
}

/// Score StochRSI %K/%D, evaluated in order:
///   1. %K/%D cross while in the extreme zone: `weight`.
///   2. Sitting in the extreme zone without a fresh cross: `weight / 2`.
///   3. Otherwise neutral.
pub fn score(
    closes: &[f64],
    rsi_period: usize,
    stoch_period: usize,
    k_period: usize,
    d_period: usize,
    oversold: f64,
    overbought: f64,
) -> IndicatorResult {
    let stoch = calculate_stoch_rsi(closes, rsi_period, stoch_period);
    let k_series = sma(&stoch, k_period);
    let d_series = sma(&k_series, d_period);

    if k_series.len() < 2 || d_series.len() < 2 {
        return IndicatorResult::neutral();
    }

    let k_cur = *k_series.last().unwrap();
    let k_prev = k_series[k_series.len() - 2];
    let d_cur = *d_series.last().unwrap();
    let d_prev = d_series[d_series.len() - 2];

    let weight = max_score() as f64;
    let oversold_zone = k_cur <= oversold;
    let overbought_zone = k_cur >= overbought;
    let bullish_cross = k_prev <= d_prev && k_cur > d_cur;
    let bearish_cross = k_prev >= d_prev && k_cur < d_cur;

    let raw = if oversold_zone && bullish_cross {
        weight
    } else if overbought_zone && bearish_cross {
        -weight
    } else if oversold_zone {
        weight / 2.0
    } else if overbought_zone {
        -weight / 2.0
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

    #[test]
    fn calculate_stoch_rsi_bounded() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 10.0)
            .collect();
        let series = calculate_stoch_rsi(&closes, 14, 14);
        for v in series {
            assert!((0.0..=100.0).contains(&v), "StochRSI {v} out of range");
        }
    }

    #[test]
    fn calculate_stoch_rsi_insufficient_data() {
        assert!(calculate_stoch_rsi(&[1.0, 2.0, 3.0], 14, 14).is_empty());
    }

    #[test]
    fn score_oversold_cross_is_buy() {
        // Deep downtrend then a sharp bounce -> oversold zone with bullish cross.
        let mut closes: Vec<f64> = (0..40).map(|i| 200.0 - i as f64 * 2.0).collect();
        closes.push(closes.last().unwrap() + 15.0);
        closes.push(closes.last().unwrap() + 15.0);
        let r = score(&closes, 14, 14, 3, 3, 20.0, 80.0);
        assert!(r.score.abs() <= max_score());
    }

    #[test]
    fn score_insufficient_data_is_neutral() {
        let r = score(&[1.0, 2.0], 14, 14, 3, 3, 20.0, 80.0);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn score_bounded_by_max_score() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 10.0)
            .collect();
        let r = score(&closes, 14, 14, 3, 3, 20.0, 80.0);
        assert!(r.score.abs() <= max_score());
    }
}
