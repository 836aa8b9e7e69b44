// =============================================================================
// Shared indicator output types
// =============================================================================
//
// Every directional indicator (all of them except ATR, which reports a
// volatility regime rather than a direction) reduces to the same shape: a raw
// value, an integer score bounded by the indicator's configured weight, and a
// coarse BUY/SELL/NEUTRAL signal. Keeping this as one type lets the aggregator
// stay generic over which indicator produced a result.

use serde::{Deserialize, Serialize};

/// Coarse direction implied by a single indicator reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorSignal {
    Buy,
    Sell,
    Neutral,
}

impl std::fmt::Display for IndicatorSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Output of a single technical indicator evaluation.
///
/// `score` is always an integer in `[-max_score, +max_score]` for the
/// indicator that produced it — rounding to the nearest integer happens once,
/// here, at the boundary between floating-point math and the rest of the
/// system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorResult {
    pub value: f64,
    pub score: i32,
    pub signal: IndicatorSignal,
}

impl IndicatorResult {
    /// The neutral result returned whenever an indicator has insufficient
    /// data to compute — never an error, per the insufficient-data handling
    /// rule: indicators degrade to neutral rather than failing the pipeline.
    pub fn neutral() -> Self {
        Self {
            value: 0.0,
            score: 0,
            signal: IndicatorSignal::Neutral,
        }
    }

    /// Build a result from a raw floating-point score, rounding to the
    /// nearest integer and deriving the signal from its sign.
    pub fn from_score(value: f64, raw_score: f64) -> Self {
        let score = round_score(raw_score);
        let signal = signal_from_score(score);
        Self {
            value,
            score,
            signal,
        }
    }
}

/// Round a raw floating-point score to the nearest integer. Scores are never
/// compared for equality as floats — only this rounded integer crosses the
/// indicator boundary.
pub fn round_score(raw: f64) -> i32 {
    raw.round() as i32
}

/// Derive a BUY/SELL/NEUTRAL signal from a rounded integer score.
pub fn signal_from_score(score: i32) -> IndicatorSignal {
    match score.cmp(&0) {
        std::cmp::Ordering::Greater => IndicatorSignal::Buy,
        std::cmp::Ordering::Less => IndicatorSignal::Sell,
        std::cmp::Ordering::Equal => IndicatorSignal::Neutral,
    }
}

/// Clamp a score to `[-max_score, max_score]`.
pub fn clamp_score(score: i32, max_score: i32) -> i32 {
    score.clamp(-max_score, max_score)
}
