// =============================================================================
// MarketData capability — the screener's only dependency on a transport
// =============================================================================
//
// Fingerprint-opaque per spec.md §6: nothing downstream may depend on a
// specific exchange. `listContracts`/`fetchCandles`/`fetchFundingRate` are
// request/response calls and fit a trait naturally; `subscribeTicker` and
// `subscribeOrderBook` are long-lived streams and stay as the reconnect-loop
// functions already living in `market_data::candle_buffer`/`orderbook`
// (`run_kline_stream`, `run_depth_stream`) — wired directly from `main.rs`
// the way the teacher wires its kline/depth streams today.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Candle;

/// One entry from `listContracts` — static contract metadata plus the
/// 24h turnover figure used for the universe's turnover filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub symbol: String,
    pub is_quanto: bool,
    pub turnover_24h: f64,
    pub volume_24h: f64,
    pub tick_size: f64,
    pub lot_size: f64,
    pub multiplier: f64,
    pub max_leverage: f64,
}

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Active linear-perpetual contracts, unsorted and unfiltered — the
    /// screener applies the turnover filter and top-N cut itself.
    async fn list_contracts(&self) -> anyhow::Result<Vec<Contract>>;

    /// Historical candles, most recent `limit` bars, oldest first.
    async fn fetch_candles(&self, symbol: &str, granularity_minutes: u32, limit: u32) -> anyhow::Result<Vec<Candle>>;

    /// Current funding rate, if the provider exposes one. Optional per spec.
    async fn fetch_funding_rate(&self, symbol: &str) -> anyhow::Result<Option<f64>>;
}
