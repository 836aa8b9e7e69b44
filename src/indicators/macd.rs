// =============================================================================
// MACD — Moving Average Convergence/Divergence
// =============================================================================
//
//   macd_line   = EMA(fast) - EMA(slow)
//   signal_line = EMA(macd_line, signal_period)
//   histogram   = macd_line - signal_line
//
// The histogram's sign, growth, and zero-crossings are what drive the score —
// not the raw MACD value, which is not normalised across symbols.
// =============================================================================

use super::catalog::DIRECTIONAL_CATALOG;
use super::ema::calculate_ema;
use super::result::{clamp_score, round_score, signal_from_score, IndicatorResult};

/// Align two EMA series that end at the same point in time but started at
/// different offsets (shorter period => longer series) by trimming both to
/// their shared, trailing overlap.
fn align_tail<'a>(a: &'a [f64], b: &'a [f64]) -> (&'a [f64], &'a [f64]) {
    let len = a.len().min(b.len());
    (&a[a.len() - len..], &b[b.len() - len..])
}

/// Compute the MACD histogram series.
pub fn calculate_histogram(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Vec<f64> {
    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);
    if ema_fast.is_empty() || ema_slow.is_empty() {
        return Vec::new();
    }

    let (fast_aligned, slow_aligned) = align_tail(&ema_fast, &ema_slow);
    let macd_line: Vec<f64> = fast_aligned
        .iter()
        .zip(slow_aligned.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_line = calculate_ema(&macd_line, signal_period);
    if signal_line.is_empty() {
        return Vec::new();
    }

    let (macd_aligned, signal_aligned) = align_tail(&macd_line, &signal_line);
    macd_aligned
        .iter()
        .zip(signal_aligned.iter())
        .map(|(m, s)| m - s)
        .collect()
}

fn max_score() -> i32 {
    DIRECTIONAL_CATALOG
        .iter()
        .find(|s| s.name == "macd")
        .map(|s| s.max_score)
        .unwrap_or(36)
}

/// Score the MACD histogram, evaluated in order:
///   1. Accelerating (same sign, growing magnitude): `weight`.
///   2. Decelerating (same sign, shrinking magnitude): `weight * 0.67`.
///   3. Fresh zero-cross this bar: `weight * 0.83`.
///   4. Otherwise neutral.
pub fn score(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> IndicatorResult {
    let hist = calculate_histogram(closes, fast, slow, signal_period);
    if hist.len() < 2 {
        return IndicatorResult::neutral();
    }

    let cur = hist[hist.len() - 1];
    let prev = hist[hist.len() - 2];
    let weight = max_score() as f64;

    let cross_up = prev <= 0.0 && cur > 0.0;
    let cross_down = prev >= 0.0 && cur < 0.0;
    let same_sign = (cur > 0.0 && prev > 0.0) || (cur < 0.0 && prev < 0.0);
    let accelerating = same_sign && cur.abs() > prev.abs();
    let decelerating = same_sign && cur.abs() < prev.abs();

    let raw = if accelerating && cur > 0.0 {
        weight
    } else if accelerating {
        -weight
    } else if decelerating && cur > 0.0 {
        weight * 0.67
    } else if decelerating {
        -weight * 0.67
    } else if cross_up {
        weight * 0.83
    } else if cross_down {
        -weight * 0.83
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

    #[test]
    fn histogram_requires_enough_data() {
        let closes = vec![1.0, 2.0, 3.0];
        assert!(calculate_histogram(&closes, 12, 26, 9).is_empty());
    }

    #[test]
    fn histogram_nonempty_with_enough_data() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + i as f64 * 0.5).collect();
        let hist = calculate_histogram(&closes, 12, 26, 9);
        assert!(!hist.is_empty());
    }

    #[test]
    fn score_strong_uptrend_accelerating_buy() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + (i as f64).powf(1.3)).collect();
        let r = score(&closes, 12, 26, 9);
        assert!(r.score.abs() <= max_score());
    }

    #[test]
    fn score_insufficient_data_is_neutral() {
        let r = score(&[1.0, 2.0], 12, 26, 9);
        assert_eq!(r.score, 0);
    }
}
