// =============================================================================
// Signal Aggregator — cap arithmetic, confidence penalties, classification
// =============================================================================
//
// Pure pipeline: per-indicator results in, one bounded Signal out. No
// interior mutability, no I/O — given the same inputs this always produces
// the same output, the way `indicators::rsi::score` and friends are pure.
//
// Pipeline (deterministic, in order):
//   1. Sum directional indicator scores (everything in the catalog except
//      DOM and ATR, which are not directional).
//   2. Clamp the directional sum to the indicator cap.
//   3. Clamp the DOM (microstructure) score to the micro cap independently.
//   4. totalScore = clamp(indicatorSum + microSum, -totalCap, totalCap).
//   5. Classify totalScore against the nine-band partition of [-220, 220].
//   6. bullishCount / bearishCount / confluence from the directional set.
//   7. Confidence: start at 1.0, apply each penalty once, clamp to [0, 1].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::indicators::atr::AtrReading;
use crate::indicators::catalog::DIRECTIONAL_CATALOG;
use crate::indicators::{IndicatorResult, IndicatorSignal};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// One of the nine ordered classification bands. Each variant owns a closed
/// integer interval; together the nine intervals partition `[-220, 220]`
/// with no gaps and no overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    ExtremeBuy,
    StrongBuy,
    Buy,
    BuyWeak,
    Neutral,
    SellWeak,
    Sell,
    StrongSell,
    ExtremeSell,
}

/// `(classification, lower_bound, upper_bound)` — the fixed partition of
/// `[-220, 220]`. Ordered most-bullish first; `classify` does a linear scan
/// and returns the first band whose interval contains the score.
const BANDS: &[(Classification, i32, i32)] = &[
    (Classification::ExtremeBuy, 130, 220),
    (Classification::StrongBuy, 90, 129),
    (Classification::Buy, 60, 89),
    (Classification::BuyWeak, 40, 59),
    (Classification::Neutral, -39, 39),
    (Classification::SellWeak, -59, -40),
    (Classification::Sell, -89, -60),
    (Classification::StrongSell, -129, -90),
    (Classification::ExtremeSell, -220, -130),
];

impl Classification {
    /// Linear scan of the closed-interval bands; first match wins.
    pub fn classify(total_score: i32) -> Self {
        for (band, lo, hi) in BANDS {
            if total_score >= *lo && total_score <= *hi {
                return *band;
            }
        }
        // Unreachable: BANDS partitions [-220, 220] and callers always clamp
        // total_score into that range before classifying.
        Classification::Neutral
    }

    /// The band's own closed interval, as configured in `BANDS`.
    pub fn range(self) -> (i32, i32) {
        BANDS
            .iter()
            .find(|(band, _, _)| *band == self)
            .map(|(_, lo, hi)| (*lo, *hi))
            .expect("every Classification variant has a BANDS entry")
    }

    /// Midpoint of the band's interval, rounded toward zero.
    pub fn range_mid(self) -> i32 {
        let (lo, hi) = self.range();
        (lo + hi) / 2
    }

    pub fn is_extreme(self) -> bool {
        matches!(self, Classification::ExtremeBuy | Classification::ExtremeSell)
    }

    pub fn is_weak(self) -> bool {
        matches!(self, Classification::BuyWeak | Classification::SellWeak)
    }

    /// True for the five bands whose interval sits at or above zero — the
    /// "positive half" used to normalise trade side (open question #3 in
    /// the design notes: side = LONG iff the classification band is on the
    /// positive half, superseding any string-based action mixing).
    pub fn is_bullish_half(self) -> bool {
        self.range().0 >= 0
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::ExtremeBuy => "EXTREME_BUY",
            Classification::StrongBuy => "STRONG_BUY",
            Classification::Buy => "BUY",
            Classification::BuyWeak => "BUY_WEAK",
            Classification::Neutral => "NEUTRAL",
            Classification::SellWeak => "SELL_WEAK",
            Classification::Sell => "SELL",
            Classification::StrongSell => "STRONG_SELL",
            Classification::ExtremeSell => "EXTREME_SELL",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse action derived from the classification's half — the aggregator's
/// own opinion on direction, independent of any risk-gate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
    Neutral,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

impl From<Classification> for Action {
    fn from(c: Classification) -> Self {
        if c == Classification::Neutral {
            Action::Neutral
        } else if c.is_bullish_half() {
            Action::Buy
        } else {
            Action::Sell
        }
    }
}

// ---------------------------------------------------------------------------
// Caps — configurable clamp points (runtime_config overrides these)
// ---------------------------------------------------------------------------

/// Clamp bounds for the three summation stages. Defaults match spec.md §4.2.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Caps {
    pub indicator_cap: i32,
    pub micro_cap: i32,
    pub total_cap: i32,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            indicator_cap: 200,
            micro_cap: 20,
            total_cap: 220,
        }
    }
}

/// Confidence-penalty magnitudes. Config-driven per spec.md §9's open
/// question: these are the live-code defaults, applied verbatim unless a
/// config override replaces them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidencePenalties {
    pub low_score_penalty: f64,
    pub low_score_threshold: i32,
    pub atr_high_penalty: f64,
    pub atr_high_threshold: f64,
    pub atr_medium_penalty: f64,
    pub atr_medium_threshold: f64,
    pub conflict_penalty_per_pair: f64,
    pub low_confluence_penalty: f64,
    pub low_confluence_threshold: f64,
}

impl Default for ConfidencePenalties {
    fn default() -> Self {
        Self {
            low_score_penalty: 0.10,
            low_score_threshold: 60,
            atr_high_penalty: 0.06,
            atr_high_threshold: 6.0,
            atr_medium_penalty: 0.03,
            atr_medium_threshold: 4.0,
            conflict_penalty_per_pair: 0.02,
            low_confluence_penalty: 0.05,
            low_confluence_threshold: 0.6,
        }
    }
}

// ---------------------------------------------------------------------------
// Signal — the aggregator's output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub total_score: i32,
    pub indicator_score: i32,
    pub microstructure_score: i32,
    pub classification: Classification,
    pub action: Action,
    pub confidence: f64,
    pub bullish_count: usize,
    pub bearish_count: usize,
    pub confluence: f64,
    pub indicators: HashMap<String, IndicatorResult>,
    pub timestamp: i64,
}

impl Signal {
    pub fn is_neutral(&self) -> bool {
        self.classification == Classification::Neutral
    }
}

// ---------------------------------------------------------------------------
// aggregate()
// ---------------------------------------------------------------------------

/// Combine per-indicator results into one bounded `Signal`.
///
/// `indicator_results` must be keyed by the indicator names in
/// [`DIRECTIONAL_CATALOG`] (`"rsi"`, `"macd"`, ...); any catalog entry absent
/// from the map is treated as a neutral `{score: 0}` reading rather than an
/// error, matching the insufficient-data policy those functions already
/// implement at the indicator boundary.
///
/// `dom` is the independent microstructure (order-book) reading; `None` is
/// equivalent to a neutral DOM score of zero (e.g. an empty order book).
///
/// `atr` feeds only the confidence penalty — ATR is explicitly excluded from
/// the directional sum per spec.md §9's deliberate correction to the source
/// behavior.
pub fn aggregate(
    indicator_results: &HashMap<String, IndicatorResult>,
    dom: Option<&IndicatorResult>,
    atr: Option<&AtrReading>,
    caps: &Caps,
    penalties: &ConfidencePenalties,
    timestamp: i64,
) -> Signal {
    // --- 1 & 2: directional sum, clamped -----------------------------------
    let neutral = IndicatorResult::neutral();
    let mut indicator_sum = 0i32;
    let mut bullish_count = 0usize;
    let mut bearish_count = 0usize;
    let mut snapshot: HashMap<String, IndicatorResult> = HashMap::with_capacity(DIRECTIONAL_CATALOG.len() + 1);

    for spec in DIRECTIONAL_CATALOG {
        let result = indicator_results.get(spec.name).unwrap_or(&neutral);
        indicator_sum += result.score;
        match result.signal {
            IndicatorSignal::Buy => bullish_count += 1,
            IndicatorSignal::Sell => bearish_count += 1,
            IndicatorSignal::Neutral => {}
        }
        snapshot.insert(spec.name.to_string(), result.clone());
    }
    let indicator_score = indicator_sum.clamp(-caps.indicator_cap, caps.indicator_cap);

    // --- 3: DOM clamped independently ---------------------------------------
    let dom_result = dom.cloned().unwrap_or_else(IndicatorResult::neutral);
    let microstructure_score = dom_result.score.clamp(-caps.micro_cap, caps.micro_cap);
    snapshot.insert("dom".to_string(), dom_result);

    // --- 4: total, clamped ---------------------------------------------------
    let total_score =
        (indicator_score + microstructure_score).clamp(-caps.total_cap, caps.total_cap);

    // --- 5: classify -----------------------------------------------------------
    let classification = Classification::classify(total_score);
    let action = Action::from(classification);

    // --- 6: confluence ---------------------------------------------------------
    let indicator_count = DIRECTIONAL_CATALOG.len();
    let confluence = if indicator_count == 0 {
        0.0
    } else {
        bullish_count.max(bearish_count) as f64 / indicator_count as f64
    };

    // --- 7: confidence -----------------------------------------------------------
    let mut confidence = 1.0;
    if total_score.abs() < penalties.low_score_threshold {
        confidence -= penalties.low_score_penalty;
    }
    if let Some(reading) = atr {
        if reading.atr_pct > penalties.atr_high_threshold {
            confidence -= penalties.atr_high_penalty;
        } else if reading.atr_pct > penalties.atr_medium_threshold {
            confidence -= penalties.atr_medium_penalty;
        }
    }
    let conflicting_pairs = bullish_count.min(bearish_count);
    confidence -= penalties.conflict_penalty_per_pair * conflicting_pairs as f64;
    if confluence < penalties.low_confluence_threshold {
        confidence -= penalties.low_confluence_penalty;
    }
    let confidence = confidence.clamp(0.0, 1.0);

    Signal {
        total_score,
        indicator_score,
        microstructure_score,
        classification,
        action,
        confidence,
        bullish_count,
        bearish_count,
        confluence,
        indicators: snapshot,
        timestamp,
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::atr::AtrRegime;

    fn buy(score: i32) -> IndicatorResult {
        IndicatorResult {
            value: 0.0,
            score,
            signal: IndicatorSignal::Buy,
        }
    }

    fn sell(score: i32) -> IndicatorResult {
        IndicatorResult {
            value: 0.0,
            score,
            signal: IndicatorSignal::Sell,
        }
    }

    // ---- classification boundaries (spec.md §8) ---------------------------

    #[test]
    fn boundary_130_is_extreme_buy() {
        assert_eq!(Classification::classify(130), Classification::ExtremeBuy);
    }

    #[test]
    fn boundary_129_is_strong_buy() {
        assert_eq!(Classification::classify(129), Classification::StrongBuy);
    }

    #[test]
    fn boundary_neg39_is_neutral() {
        assert_eq!(Classification::classify(-39), Classification::Neutral);
    }

    #[test]
    fn boundary_neg40_is_sell_weak() {
        assert_eq!(Classification::classify(-40), Classification::SellWeak);
    }

    #[test]
    fn bands_partition_full_range_no_gaps_no_overlaps() {
        for score in -220..=220 {
            // Must classify to exactly one band — classify() always returns
            // a value, so we check that score actually falls within its
            // returned band's own interval (no silent fallback taken).
            let c = Classification::classify(score);
            let (lo, hi) = c.range();
            assert!(
                score >= lo && score <= hi,
                "score {score} misclassified into band {c:?} with range {lo}..={hi}"
            );
        }
    }

    #[test]
    fn classify_is_idempotent_on_range_mid() {
        for (band, _, _) in BANDS {
            let mid = band.range_mid();
            assert_eq!(Classification::classify(mid), *band);
        }
    }

    // ---- aggregate() --------------------------------------------------------

    #[test]
    fn empty_inputs_produce_neutral_signal() {
        let signal = aggregate(
            &HashMap::new(),
            None,
            None,
            &Caps::default(),
            &ConfidencePenalties::default(),
            1_000,
        );
        assert_eq!(signal.total_score, 0);
        assert_eq!(signal.classification, Classification::Neutral);
        assert!(signal.is_neutral());
    }

    #[test]
    fn empty_order_book_gives_zero_dom_and_neutral_signal() {
        let signal = aggregate(
            &HashMap::new(),
            None, // empty order book => no DOM reading
            None,
            &Caps::default(),
            &ConfidencePenalties::default(),
            1_000,
        );
        assert_eq!(signal.microstructure_score, 0);
        assert_eq!(signal.classification, Classification::Neutral);
    }

    #[test]
    fn directional_sum_excludes_atr() {
        // ATR is never looked up by name in the directional catalog, so
        // inserting an "atr" key has no effect on indicator_score.
        let mut inputs = HashMap::new();
        inputs.insert("atr".to_string(), buy(9999));
        let signal = aggregate(
            &inputs,
            None,
            None,
            &Caps::default(),
            &ConfidencePenalties::default(),
            1_000,
        );
        assert_eq!(signal.indicator_score, 0);
    }

    #[test]
    fn total_score_is_always_within_total_cap() {
        let mut inputs = HashMap::new();
        for spec in DIRECTIONAL_CATALOG {
            inputs.insert(spec.name.to_string(), buy(spec.max_score * 10));
        }
        let dom = buy(9999);
        let signal = aggregate(
            &inputs,
            Some(&dom),
            None,
            &Caps::default(),
            &ConfidencePenalties::default(),
            1_000,
        );
        assert!(signal.total_score <= 220 && signal.total_score >= -220);
        assert_eq!(signal.classification, Classification::ExtremeBuy);
    }

    #[test]
    fn confidence_always_in_unit_interval() {
        let mut inputs = HashMap::new();
        for (i, spec) in DIRECTIONAL_CATALOG.iter().enumerate() {
            let r = if i % 2 == 0 { buy(spec.max_score) } else { sell(spec.max_score) };
            inputs.insert(spec.name.to_string(), r);
        }
        let atr = AtrReading {
            atr: 100.0,
            atr_pct: 12.0,
            regime: AtrRegime::High,
            sizing_hint: 0.5,
        };
        let signal = aggregate(
            &inputs,
            None,
            Some(&atr),
            &Caps::default(),
            &ConfidencePenalties::default(),
            1_000,
        );
        assert!((0.0..=1.0).contains(&signal.confidence));
    }

    #[test]
    fn conflicting_indicators_reduce_confidence() {
        let mut unanimous = HashMap::new();
        for spec in DIRECTIONAL_CATALOG {
            unanimous.insert(spec.name.to_string(), buy(spec.max_score));
        }
        let mut conflicted = HashMap::new();
        for (i, spec) in DIRECTIONAL_CATALOG.iter().enumerate() {
            let r = if i < DIRECTIONAL_CATALOG.len() / 2 { buy(spec.max_score) } else { sell(spec.max_score) };
            conflicted.insert(spec.name.to_string(), r);
        }

        let caps = Caps::default();
        let penalties = ConfidencePenalties::default();
        let s1 = aggregate(&unanimous, None, None, &caps, &penalties, 0);
        let s2 = aggregate(&conflicted, None, None, &caps, &penalties, 0);
        assert!(s2.confidence < s1.confidence);
    }

    #[test]
    fn bullish_count_and_confluence_track_directional_signals() {
        let mut inputs = HashMap::new();
        for spec in DIRECTIONAL_CATALOG {
            inputs.insert(spec.name.to_string(), buy(spec.max_score));
        }
        let signal = aggregate(
            &inputs,
            None,
            None,
            &Caps::default(),
            &ConfidencePenalties::default(),
            0,
        );
        assert_eq!(signal.bullish_count, DIRECTIONAL_CATALOG.len());
        assert_eq!(signal.bearish_count, 0);
        assert!((signal.confluence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn action_matches_classification_half() {
        let mut inputs = HashMap::new();
        for spec in DIRECTIONAL_CATALOG {
            inputs.insert(spec.name.to_string(), sell(spec.max_score));
        }
        let signal = aggregate(
            &inputs,
            None,
            None,
            &Caps::default(),
            &ConfidencePenalties::default(),
            0,
        );
        assert_eq!(signal.action, Action::Sell);
        assert!(!signal.classification.is_bullish_half());
    }
}
