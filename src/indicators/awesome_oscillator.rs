// =============================================================================
// Awesome Oscillator (AO)
// =============================================================================
//
//   median_t = (high_t + low_t) / 2
//   AO_t     = SMA(median, fast) - SMA(median, slow)
//
// Classic patterns: a zero-line cross, a "saucer" (three same-sign bars with
// a dip/bump in the middle that turns back), and plain same-sign momentum.
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

/// Compute the Awesome Oscillator series.
pub fn calculate_ao(candles: &[Candle], fast: usize, slow: usize) -> Vec<f64> {
    let median: Vec<f64> = candles.iter().map(|c| (c.high + c.low) / 2.0).collect();
    let sma_fast = sma(&median, fast);
    let sma_slow = sma(&median, slow);
    if sma_fast.is_empty() || sma_slow.is_empty() {
        return Vec::new();
    }
    let len = sma_fast.len().min(sma_slow.len());
    sma_fast[sma_fast.len() - len..]
        .iter()
        .zip(sma_slow[sma_slow.len() - len..].iter())
        .map(|(f, s)| f - s)
        .collect()
}

fn max_score() -> i32 {
    DIRECTIONAL_CATALOG
        .iter()
        .find(|s| s.name == "awesome_oscillator")
        .map(|s| s.max_score)
        .unwrap_or(34)
}

fn is_saucer(a: f64, b: f64, c: f64) -> bool {
    // three same-sign bars with a dip (bullish) or bump (bearish) in the
    // middle that has already started to turn back.
    let all_positive = a > 0.0 && b > 0.0 && c > 0.0;
    let all_negative = a < 0.0 && b < 0.0 && c < 0.0;
    (all_positive && b < a && c > b) || (all_negative && b > a && c < b)
}

/// Score the Awesome Oscillator, evaluated in order:
///   1. Zero-line cross this bar: `weight`.
///   2. Saucer pattern (dip/bump then turn, same sign throughout): `weight * 0.71`.
///   3. Same-sign continuation: `weight * 0.29`.
///   4. Otherwise neutral.
pub fn score(candles: &[Candle], fast: usize, slow: usize) -> IndicatorResult {
    let series = calculate_ao(candles, fast, slow);
    if series.len() < 2 {
        return IndicatorResult::neutral();
    }

    let cur = *series.last().unwrap();
    let prev = series[series.len() - 2];
    let weight = max_score() as f64;

    let cross_up = prev <= 0.0 && cur > 0.0;
    let cross_down = prev >= 0.0 && cur < 0.0;
    let saucer = series.len() >= 3
        && is_saucer(series[series.len() - 3], prev, cur);
    let same_sign_up = cur > 0.0 && prev > 0.0;
    let same_sign_down = cur < 0.0 && prev < 0.0;

    let raw = if cross_up {
        weight
    } else if cross_down {
        -weight
    } else if saucer && cur > 0.0 {
        weight * 0.71
    } else if saucer {
        -weight * 0.71
    } else if same_sign_up {
        weight * 0.29
    } else if same_sign_down {
        -weight * 0.29
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

    fn candle(high: f64, low: f64) -> Candle {
        Candle {
            open_time: 0,
            close_time: 0,
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
            volume: 1.0,
            quote_volume: 1.0,
            trades_count: 1,
            taker_buy_volume: 1.0,
            taker_buy_quote_volume: 1.0,
            is_closed: true,
        }
    }

    #[test]
    fn ao_insufficient_data() {
        let candles = vec![candle(101.0, 99.0); 5];
        assert!(calculate_ao(&candles, 5, 34).is_empty());
    }

    #[test]
    fn ao_flat_market_is_zero() {
        let candles = vec![candle(101.0, 99.0); 40];
        let series = calculate_ao(&candles, 5, 34);
        for v in series {
            assert!(v.abs() < 1e-9);
        }
    }

    #[test]
    fn score_insufficient_data_is_neutral() {
        let candles = vec![candle(101.0, 99.0); 5];
        let r = score(&candles, 5, 34);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn score_bounded_by_max_score() {
        let candles: Vec<Candle> = (0..60)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.3).sin() * 10.0;
                candle(base + 2.0, base - 2.0)
            })
            .collect();
        let r = score(&candles, 5, 34);
        assert!(r.score.abs() <= max_score());
    }
}
