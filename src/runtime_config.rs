// =============================================================================
// Runtime Configuration — hot-reloadable engine settings with atomic save
// =============================================================================
//
// Every tunable lives here so the engine can be reconfigured without a
// restart: classification caps and confidence penalties for the signal
// aggregator, entry gates and sizing for the risk manager, simulated costs
// for the paper trader, and universe/scan knobs for the screener.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. Every field carries `#[serde(default)]` so that adding a field never
// breaks loading an older config file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::paper_trader::PaperTraderConfig;
use crate::risk::RiskConfig;
use crate::screener::ScreenerConfig;
use crate::signals::aggregator::{Caps, ConfidencePenalties};

/// Engine mode per spec.md §6. This crate implements `Paper` only; `Live` and
/// `Backtest` are recognised configuration values kept for forward
/// compatibility with the wider system (live order placement and historical
/// backtesting are explicit spec.md §1 non-goals) but select no behavior here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Paper,
    Live,
    Backtest,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Paper
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "paper"),
            Self::Live => write!(f, "live"),
            Self::Backtest => write!(f, "backtest"),
        }
    }
}

/// Top-level runtime configuration for the screener engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub caps: Caps,
    #[serde(default)]
    pub confidence_penalties: ConfidencePenalties,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub paper_trader: PaperTraderConfig,
    #[serde(default)]
    pub screener: ScreenerConfig,
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(path = %path.display(), "runtime config loaded");
        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self).context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content).with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path).with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_caps() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.caps.total_cap, 220);
        assert_eq!(cfg.screener.top_coins_count, 100);
        assert_eq!(cfg.risk.max_open_positions, 5);
        assert!((cfg.paper_trader.initial_balance - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.caps.total_cap, 220);
        assert_eq!(cfg.screener.cooldown_ms, 300_000);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "screener": { "top_coins_count": 25 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.screener.top_coins_count, 25);
        assert_eq!(cfg.screener.scan_interval_ms, 60_000);
        assert_eq!(cfg.risk.min_score, 75);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = RuntimeConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.screener.top_coins_count, cfg2.screener.top_coins_count);
        assert_eq!(cfg.risk.max_open_positions, cfg2.risk.max_open_positions);
    }
}
