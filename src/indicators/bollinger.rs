// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ). The Band Width (BBW) is the normalised
// distance: BBW = (upper - lower) / middle * 100.
//
// BBW is the primary metric used by the regime detector.

/// Result of a Bollinger Band calculation.
#[derive(Debug, Clone)]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

/// Calculate Bollinger Bands for the given closing prices.
///
/// Returns `Some(BollingerResult)` containing:
/// - `upper`  = SMA + `num_std` * σ
/// - `middle` = SMA
/// - `lower`  = SMA - `num_std` * σ
/// - `width`  = (upper - lower) / middle * 100  (Bollinger Band Width)
///
/// Returns `None` when:
/// - Fewer than `period` data points.
/// - Middle band is zero (degenerate input).
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerResult> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let sum: f64 = window.iter().sum();
    let middle = sum / period as f64;

    if middle == 0.0 {
        return None;
    }

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;
    let width = (upper - lower) / middle * 100.0;

    if width.is_finite() {
        Some(BollingerResult {
            upper,
            middle,
            lower,
            width,
        })
    } else {
        None
    }
}

// =============================================================================
// Scoring
// =============================================================================

use super::catalog::DIRECTIONAL_CATALOG;
use super::result::{clamp_score, round_score, signal_from_score, IndicatorResult, IndicatorSignal};

fn max_score() -> i32 {
    DIRECTIONAL_CATALOG
        .iter()
        .find(|s| s.name == "bollinger")
        .map(|s| s.max_score)
        .unwrap_or(40)
}

/// Score price against the Bollinger Band, evaluated in order:
///   1. At/below lower band, rising off it: `weight` BUY.
///   2. At/below lower band, still falling: `weight / 2` BUY.
///   3. Mirror image at the upper band, SELL.
///   4. Walking the band (price moving further from the middle inside the
///      band): `weight * 0.25`, signed by direction.
///   5. Otherwise neutral.
pub fn score(closes: &[f64], period: usize, num_std: f64) -> IndicatorResult {
    if closes.len() < 2 {
        return IndicatorResult::neutral();
    }
    let Some(bb) = calculate_bollinger(closes, period, num_std) else {
        return IndicatorResult::neutral();
    };

    let price = closes[closes.len() - 1];
    let prev = closes[closes.len() - 2];
    let weight = max_score() as f64;

    let raw = if price <= bb.lower {
        if price > prev {
            weight
        } else {
            weight / 2.0
        }
    } else if price >= bb.upper {
        if price < prev {
            -weight
        } else {
            -weight / 2.0
        }
    } else if price < bb.middle && price < prev {
        -weight * 0.25
    } else if price > bb.middle && price > prev {
        weight * 0.25
    } else {
        0.0
    };

    let score = clamp_score(round_score(raw), max_score());
    IndicatorResult {
        value: price,
        score,
        signal: signal_from_score(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let result = calculate_bollinger(&closes, 20, 2.0);
        assert!(result.is_some());
        let bb = result.unwrap();
        assert!(bb.upper > bb.middle);
        assert!(bb.lower < bb.middle);
        assert!(bb.width > 0.0);
    }

    #[test]
    fn bollinger_insufficient_data() {
        let closes = vec![1.0, 2.0, 3.0];
        assert!(calculate_bollinger(&closes, 20, 2.0).is_none());
    }

    #[test]
    fn bollinger_flat() {
        let closes = vec![100.0; 20];
        let result = calculate_bollinger(&closes, 20, 2.0);
        assert!(result.is_some());
        assert!((result.unwrap().width - 0.0).abs() < 1e-10);
    }

    // ---- score -------------------------------------------------------

    #[test]
    fn score_bounce_off_lower_is_buy() {
        let mut closes: Vec<f64> = vec![100.0; 20];
        closes.push(80.0); // sharp drop, below lower band
        closes.push(85.0); // up-tick off the lows
        let r = score(&closes, 20, 2.0);
        assert!(r.score > 0);
        assert_eq!(r.signal, IndicatorSignal::Buy);
    }

    #[test]
    fn score_below_lower_falling_is_weaker_buy() {
        let mut closes: Vec<f64> = vec![100.0; 20];
        closes.push(85.0);
        closes.push(80.0); // still falling
        let r = score(&closes, 20, 2.0);
        assert!(r.score > 0);
    }

    #[test]
    fn score_insufficient_data_is_neutral() {
        let r = score(&[1.0, 2.0], 20, 2.0);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn score_bounded_by_max_score() {
        let mut closes: Vec<f64> = vec![100.0; 20];
        closes.push(50.0);
        closes.push(55.0);
        let r = score(&closes, 20, 2.0);
        assert!(r.score.abs() <= max_score());
    }
}
