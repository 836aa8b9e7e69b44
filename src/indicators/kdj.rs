// =============================================================================
// KDJ
// =============================================================================
//
//   RSV_t = (close - lowestLow(period)) / (highestHigh(period) - lowestLow(period)) * 100
//   K_t   = (2/3) * K_{t-1} + (1/3) * RSV_t      (seeded K_0 = 50)
//   D_t   = (2/3) * D_{t-1} + (1/3) * K_t        (seeded D_0 = 50)
//   J_t   = 3*K_t - 2*D_t
//
// J is unbounded and can swing outside [0, 100] — that overshoot is itself
// the strongest signal KDJ produces.
// =============================================================================

use crate::market_data::Candle;

use super::catalog::DIRECTIONAL_CATALOG;
use super::result::{clamp_score, round_score, signal_from_score, IndicatorResult};

/// KDJ reading at a single point in time.
#[derive(Debug, Clone, Copy)]
pub struct KdjPoint {
    pub k: f64,
    pub d: f64,
    pub j: f64,
}

/// Compute the full K/D/J series.
pub fn calculate_kdj(candles: &[Candle], period: usize) -> Vec<KdjPoint> {
    if period == 0 || candles.len() < period {
        return Vec::new();
    }

    let mut k = 50.0;
    let mut d = 50.0;
    let mut out = Vec::with_capacity(candles.len() - period + 1);

    for window in candles.windows(period) {
        let highest = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let lowest = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let close = window[window.len() - 1].close;
        let range = highest - lowest;
        let rsv = if range.abs() < f64::EPSILON {
            50.0
        } else {
            (close - lowest) / range * 100.0
        };

        k = (2.0 / 3.0) * k + (1.0 / 3.0) * rsv;
        d = (2.0 / 3.0) * d + (1.0 / 3.0) * k;
        let j = 3.0 * k - 2.0 * d;

        out.push(KdjPoint { k, d, j });
    }
    out
}

fn max_score() -> i32 {
    DIRECTIONAL_CATALOG
        .iter()
        .find(|s| s.name == "kdj")
        .map(|s| s.max_score)
        .unwrap_or(34)
}

/// Score KDJ, evaluated in order:
///   1. J overshoots outside `[0, 100]`: `weight`.
///   2. K/D cross while K sits in the extreme zone: `weight * 0.88`.
///   3. K in the extreme zone without a fresh cross: `weight * 0.59`.
///   4. Otherwise neutral.
pub fn score(candles: &[Candle], period: usize, oversold: f64, overbought: f64) -> IndicatorResult {
    let series = calculate_kdj(candles, period);
    if series.len() < 2 {
        return IndicatorResult::neutral();
    }

    let cur = series[series.len() - 1];
    let prev = series[series.len() - 2];
    let weight = max_score() as f64;

    let oversold_zone = cur.k <= oversold;
    let overbought_zone = cur.k >= overbought;
    let bullish_cross = prev.k <= prev.d && cur.k > cur.d;
    let bearish_cross = prev.k >= prev.d && cur.k < cur.d;

    let raw = if cur.j < 0.0 {
        weight
    } else if cur.j > 100.0 {
        -weight
    } else if oversold_zone && bullish_cross {
        weight * 0.88
    } else if overbought_zone && bearish_cross {
        -weight * 0.88
    } else if oversold_zone {
        weight * 0.59
    } else if overbought_zone {
        -weight * 0.59
    } else {
        0.0
    };

    let score = clamp_score(round_score(raw), max_score());
    IndicatorResult {
        value: cur.j,
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
    fn kdj_insufficient_data() {
        let candles = vec![candle(101.0, 99.0, 100.0); 3];
        assert!(calculate_kdj(&candles, 9).is_empty());
    }

    #[test]
    fn kdj_seeded_at_fifty() {
        let candles = vec![candle(101.0, 99.0, 100.0); 9];
        let series = calculate_kdj(&candles, 9);
        assert_eq!(series.len(), 1);
        assert!((series[0].k - 50.0).abs() < 1.0);
    }

    #[test]
    fn score_insufficient_data_is_neutral() {
        let candles = vec![candle(101.0, 99.0, 100.0); 3];
        let r = score(&candles, 9, 20.0, 80.0);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn score_bounded_by_max_score() {
        let candles: Vec<Candle> = (0..40)
            .map(|i| {
                let base = 100.0 - i as f64 * 2.0;
                candle(base + 1.0, base - 1.0, base)
            })
            .collect();
        let r = score(&candles, 9, 20.0, 80.0);
        assert!(r.score.abs() <= max_score());
    }
}
