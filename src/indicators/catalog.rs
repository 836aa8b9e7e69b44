// =============================================================================
// Indicator catalog — weight/maxScore table
// =============================================================================
//
// Each indicator is data (a name, a weight that doubles as its maximum
// absolute score, and the handful of period/threshold parameters it needs)
// rather than a polymorphic type hierarchy. The scoring *rules* themselves
// still differ per indicator (threshold zones, crossovers, divergence), so
// each indicator module keeps its own small evaluator function, but the
// weight table lives in one place so `runtime_config` can override it without
// every indicator needing its own config section.

/// Static description of one entry in the scoring catalog.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorSpec {
    pub name: &'static str,
    /// Doubles as both the scoring weight and the maximum absolute score.
    pub max_score: i32,
}

/// The fixed set of indicators that feed the directional sum (all indicators
/// except ATR, which reports a volatility regime, and DOM, which is clamped
/// and summed separately as the microstructure component).
pub const DIRECTIONAL_CATALOG: &[IndicatorSpec] = &[
    IndicatorSpec { name: "rsi", max_score: 34 },
    IndicatorSpec { name: "stoch_rsi", max_score: 40 },
    IndicatorSpec { name: "macd", max_score: 36 },
    IndicatorSpec { name: "bollinger", max_score: 40 },
    IndicatorSpec { name: "williams_r", max_score: 50 },
    IndicatorSpec { name: "stochastic", max_score: 36 },
    IndicatorSpec { name: "ema_trend", max_score: 38 },
    IndicatorSpec { name: "awesome_oscillator", max_score: 34 },
    IndicatorSpec { name: "kdj", max_score: 34 },
    IndicatorSpec { name: "obv", max_score: 36 },
    IndicatorSpec { name: "cmf", max_score: 38 },
    IndicatorSpec { name: "cci", max_score: 32 },
];

/// DOM (order-book imbalance) is scored independently and summed into its own
/// microstructure component rather than the directional sum.
pub const DOM_MAX_SCORE: i32 = 30;

/// ATR does not participate in the directional sum at all — it reports a
/// volatility regime used for sizing/leverage, not a BUY/SELL direction.
pub const ATR_MAX_SCORE: i32 = 30;

/// Number of indicators that feed `bullishCount`/`bearishCount`/`confluence`.
pub fn directional_indicator_count() -> usize {
    DIRECTIONAL_CATALOG.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_twelve_directional_entries() {
        assert_eq!(DIRECTIONAL_CATALOG.len(), 12);
        assert_eq!(directional_indicator_count(), 12);
    }

    #[test]
    fn max_scores_are_positive() {
        for spec in DIRECTIONAL_CATALOG {
            assert!(spec.max_score > 0, "{} has non-positive max_score", spec.name);
        }
    }
}
