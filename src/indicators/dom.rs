// =============================================================================
// Depth-of-Market (DOM) Imbalance
// =============================================================================
//
//   imbalance = (bidVolume - askVolume) / (bidVolume + askVolume)
//
// The only indicator that reads the order book rather than candles. Scored
// independently of the other 12 directional indicators and summed into its
// own microstructure component rather than the indicator sum.
// =============================================================================

use super::catalog::DOM_MAX_SCORE;
use super::result::{clamp_score, round_score, signal_from_score, IndicatorResult};

/// Score book imbalance, evaluated in order:
///   1. `|imbalance| > 0.3`: `weight`, signed.
///   2. `|imbalance| > 0.1`: `weight / 2`, signed.
///   3. Otherwise neutral — including an empty book (`bid_volume == ask_volume == 0`).
pub fn score(bid_volume: f64, ask_volume: f64) -> IndicatorResult {
    let total = bid_volume + ask_volume;
    if total.abs() < f64::EPSILON {
        return IndicatorResult::neutral();
    }

    let imbalance = (bid_volume - ask_volume) / total;
    let weight = DOM_MAX_SCORE as f64;

    let raw = if imbalance.abs() > 0.3 {
        weight * imbalance.signum()
    } else if imbalance.abs() > 0.1 {
        (weight / 2.0) * imbalance.signum()
    } else {
        0.0
    };

    let score = clamp_score(round_score(raw), DOM_MAX_SCORE);
    IndicatorResult {
        value: imbalance,
        score,
        signal: signal_from_score(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::result::IndicatorSignal;

    #[test]
    fn empty_book_is_neutral() {
        let r = score(0.0, 0.0);
        assert_eq!(r.score, 0);
        assert_eq!(r.signal, IndicatorSignal::Neutral);
    }

    #[test]
    fn strong_bid_imbalance_is_buy() {
        let r = score(800.0, 200.0); // imbalance = 0.6
        assert!(r.score > 0);
        assert_eq!(r.signal, IndicatorSignal::Buy);
    }

    #[test]
    fn strong_ask_imbalance_is_sell() {
        let r = score(200.0, 800.0); // imbalance = -0.6
        assert!(r.score < 0);
        assert_eq!(r.signal, IndicatorSignal::Sell);
    }

    #[test]
    fn mild_imbalance_below_band_is_neutral() {
        let r = score(550.0, 450.0); // imbalance = 0.1, at the boundary (not >)
        assert_eq!(r.score, 0);
    }

    #[test]
    fn score_bounded_by_max_score() {
        let r = score(1_000_000.0, 1.0);
        assert!(r.score.abs() <= DOM_MAX_SCORE);
    }
}
