// =============================================================================
// On-Balance Volume (OBV)
// =============================================================================
//
//   OBV_t = OBV_{t-1} + volume_t   if close_t > close_{t-1}
//         = OBV_{t-1} - volume_t   if close_t < close_{t-1}
//         = OBV_{t-1}              otherwise
//
// OBV itself is a cumulative, unbounded series — what matters for scoring is
// whether it confirms price direction (and sits on the expected side of its
// own moving average) or diverges from it.
// =============================================================================

use crate::market_data::Candle;

use super::catalog::DIRECTIONAL_CATALOG;
use super::result::{clamp_score, round_score, signal_from_score, IndicatorResult};

/// Compute the cumulative OBV series.
pub fn calculate_obv(candles: &[Candle]) -> Vec<f64> {
    if candles.len() < 2 {
        return Vec::new();
    }
    let mut obv = 0.0;
    let mut out = Vec::with_capacity(candles.len() - 1);
    for w in candles.windows(2) {
        if w[1].close > w[0].close {
            obv += w[1].volume;
        } else if w[1].close < w[0].close {
            obv -= w[1].volume;
        }
        out.push(obv);
    }
    out
}

fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    (0..=values.len() - period)
        .map(|i| values[i..i + period].iter().sum::<f64>() / period as f64)
        .collect()
}

fn max_score() -> i32 {
    DIRECTIONAL_CATALOG
        .iter()
        .find(|s| s.name == "obv")
        .map(|s| s.max_score)
        .unwrap_or(36)
}

/// Score OBV against price direction, evaluated in order:
///   1. Directional confirmation (price and OBV agree, OBV on the matching
///      side of its own SMA): `weight`.
///   2. Divergence (price and OBV disagree): `weight * 0.56`, signed by the
///      direction OBV implies.
///   3. Otherwise neutral.
pub fn score(candles: &[Candle], sma_window: usize) -> IndicatorResult {
    if candles.len() < 2 {
        return IndicatorResult::neutral();
    }
    let obv = calculate_obv(candles);
    if obv.len() < 2 {
        return IndicatorResult::neutral();
    }
    let obv_sma = sma(&obv, sma_window);
    let Some(&obv_sma_cur) = obv_sma.last() else {
        return IndicatorResult::neutral();
    };

    let price_cur = candles[candles.len() - 1].close;
    let price_prev = candles[candles.len() - 2].close;
    let obv_cur = *obv.last().unwrap();
    let obv_prev = obv[obv.len() - 2];

    let price_up = price_cur > price_prev;
    let price_down = price_cur < price_prev;
    let obv_up = obv_cur > obv_prev;
    let obv_down = obv_cur < obv_prev;
    let obv_above_sma = obv_cur > obv_sma_cur;

    let weight = max_score() as f64;

    let raw = if price_up && obv_up && obv_above_sma {
        weight
    } else if price_down && obv_down && !obv_above_sma {
        -weight
    } else if price_down && obv_up {
        weight * 0.56
    } else if price_up && obv_down {
        -weight * 0.56
    } else {
        0.0
    };

    let score = clamp_score(round_score(raw), max_score());
    IndicatorResult {
        value: obv_cur,
        score,
        signal: signal_from_score(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close: f64, volume: f64) -> Candle {
        Candle {
            open_time: 0,
            close_time: 0,
            open: close,
            high: close,
            low: close,
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
    fn obv_accumulates_on_up_moves() {
        let candles = vec![
            candle(100.0, 10.0),
            candle(101.0, 5.0),
            candle(102.0, 5.0),
        ];
        let series = calculate_obv(&candles);
        assert_eq!(series, vec![5.0, 10.0]);
    }

    #[test]
    fn obv_subtracts_on_down_moves() {
        let candles = vec![
            candle(100.0, 10.0),
            candle(99.0, 5.0),
        ];
        let series = calculate_obv(&candles);
        assert_eq!(series, vec![-5.0]);
    }

    #[test]
    fn score_insufficient_data_is_neutral() {
        let candles = vec![candle(100.0, 10.0)];
        let r = score(&candles, 20);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn score_confirmation_uptrend_is_buy() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| candle(100.0 + i as f64, 10.0 + i as f64))
            .collect();
        let r = score(&candles, 20);
        assert!(r.score.abs() <= max_score());
    }
}
