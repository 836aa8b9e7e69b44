// =============================================================================
// Screener — symbol universe, scan cycle, opportunity ranking
// =============================================================================
//
// Owns the contract universe and the rolling top-10 opportunity list. A scan
// cycle walks the universe in batches, computes one `Signal` per symbol from
// its cached candles, keeps only the symbols that pass the validity filter,
// ranks the survivors, and swaps the whole opportunity list in one shot —
// readers never see a partially-updated ranking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{publish, EngineEvent, EventSink};
use crate::indicators::catalog::DIRECTIONAL_CATALOG;
use crate::indicators::{atr, bollinger, cci, cmf, dom, ema, kdj, macd, obv, rsi, stoch_rsi, stochastic, williams_r, awesome_oscillator};
use crate::indicators::IndicatorResult;
use crate::market_data::{Candle, CandleBuffer, CandleKey, Contract, MarketData, OrderBookManager};
use crate::signals::aggregator::{aggregate, Caps, ConfidencePenalties, Signal};

/// Minimum closed candles required before a symbol is scored at all — the
/// slowest indicator (EMA long period) needs this much history to leave its
/// warm-up phase.
const MIN_CANDLES_FOR_SCORING: usize = 60;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Screener tunables. Defaults match spec.md §6's screener knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    #[serde(default = "defaults::top_coins_count")]
    pub top_coins_count: usize,
    #[serde(default = "defaults::min_volume_24h")]
    pub min_volume_24h: f64,
    #[serde(default = "defaults::scan_interval_ms")]
    pub scan_interval_ms: u64,
    #[serde(default = "defaults::cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "defaults::candle_cache_ttl_ms")]
    pub candle_cache_ttl_ms: u64,
    #[serde(default = "defaults::candle_granularity_minutes")]
    pub candle_granularity_minutes: u32,
    #[serde(default = "defaults::candle_history")]
    pub candle_history: u32,
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,
    #[serde(default = "defaults::inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,
    #[serde(default = "defaults::min_abs_score")]
    pub min_abs_score: i32,
    #[serde(default = "defaults::min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "defaults::max_spread_pct")]
    pub max_spread_pct: f64,
    #[serde(default = "defaults::min_confluence")]
    pub min_confluence: f64,
    #[serde(default = "defaults::opportunities_count")]
    pub opportunities_count: usize,
}

mod defaults {
    pub fn top_coins_count() -> usize {
        100
    }
    pub fn min_volume_24h() -> f64 {
        1_000_000.0
    }
    pub fn scan_interval_ms() -> u64 {
        60_000
    }
    pub fn cooldown_ms() -> u64 {
        300_000
    }
    pub fn candle_cache_ttl_ms() -> u64 {
        30_000
    }
    pub fn candle_granularity_minutes() -> u32 {
        30
    }
    pub fn candle_history() -> u32 {
        200
    }
    pub fn batch_size() -> usize {
        10
    }
    pub fn inter_batch_delay_ms() -> u64 {
        200
    }
    pub fn min_abs_score() -> i32 {
        40
    }
    pub fn min_confidence() -> f64 {
        0.7
    }
    pub fn max_spread_pct() -> f64 {
        0.1
    }
    pub fn min_confluence() -> f64 {
        0.5
    }
    pub fn opportunities_count() -> usize {
        10
    }
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            top_coins_count: defaults::top_coins_count(),
            min_volume_24h: defaults::min_volume_24h(),
            scan_interval_ms: defaults::scan_interval_ms(),
            cooldown_ms: defaults::cooldown_ms(),
            candle_cache_ttl_ms: defaults::candle_cache_ttl_ms(),
            candle_granularity_minutes: defaults::candle_granularity_minutes(),
            candle_history: defaults::candle_history(),
            batch_size: defaults::batch_size(),
            inter_batch_delay_ms: defaults::inter_batch_delay_ms(),
            min_abs_score: defaults::min_abs_score(),
            min_confidence: defaults::min_confidence(),
            max_spread_pct: defaults::max_spread_pct(),
            min_confluence: defaults::min_confluence(),
            opportunities_count: defaults::opportunities_count(),
        }
    }
}

/// Hard-coded fallback universe used when `listContracts` fails — keeps the
/// screener usable during an exchange API outage.
fn fallback_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".into(),
        "ETHUSDT".into(),
        "BNBUSDT".into(),
        "SOLUSDT".into(),
        "XRPUSDT".into(),
    ]
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// One ranked entry in the top-N opportunity list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub symbol: String,
    pub signal: Signal,
    pub rank_score: f64,
    pub spread_pct: f64,
    pub turnover_24h: f64,
    pub last_price: f64,
    pub discovered_at: chrono::DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Internal per-symbol bookkeeping
// ---------------------------------------------------------------------------

struct SymbolState {
    contract: Contract,
    cooldown_until: Option<chrono::DateTime<Utc>>,
    last_candle_fetch: Option<chrono::DateTime<Utc>>,
}

struct Inner {
    universe: HashMap<String, SymbolState>,
    opportunities: Vec<Opportunity>,
    last_scan_at: Option<chrono::DateTime<Utc>>,
    last_scan_duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Screener
// ---------------------------------------------------------------------------

pub struct Screener<M: MarketData> {
    market: Arc<M>,
    candle_buffer: Arc<CandleBuffer>,
    orderbook: Arc<OrderBookManager>,
    config: RwLock<ScreenerConfig>,
    caps: Caps,
    penalties: ConfidencePenalties,
    sink: Option<EventSink>,
    running: AtomicBool,
    state: RwLock<Inner>,
}

impl<M: MarketData> Screener<M> {
    pub fn new(market: Arc<M>, candle_buffer: Arc<CandleBuffer>, orderbook: Arc<OrderBookManager>, config: ScreenerConfig) -> Self {
        Self::with_caps(market, candle_buffer, orderbook, config, Caps::default(), ConfidencePenalties::default())
    }

    /// As [`new`](Self::new), but with explicit aggregator caps/confidence
    /// penalties instead of their defaults — used when these are
    /// hot-reloadable via `RuntimeConfig` rather than fixed at construction.
    pub fn with_caps(
        market: Arc<M>,
        candle_buffer: Arc<CandleBuffer>,
        orderbook: Arc<OrderBookManager>,
        config: ScreenerConfig,
        caps: Caps,
        penalties: ConfidencePenalties,
    ) -> Self {
        Self {
            market,
            candle_buffer,
            orderbook,
            config: RwLock::new(config),
            caps,
            penalties,
            sink: None,
            running: AtomicBool::new(false),
            state: RwLock::new(Inner {
                universe: HashMap::new(),
                opportunities: Vec::new(),
                last_scan_at: None,
                last_scan_duration_ms: 0,
            }),
        }
    }

    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.sink = Some(sink);
        self
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.sink {
            publish(sink, event);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn start(&self) {
        if !self.running.swap(true, Ordering::Relaxed) {
            info!("screener started");
            self.emit(EngineEvent::ScreenerStarted);
        }
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::Relaxed) {
            info!("screener stopped");
            self.emit(EngineEvent::ScreenerStopped);
        }
    }

    pub fn get_opportunities(&self) -> Vec<Opportunity> {
        self.state.read().opportunities.clone()
    }

    pub fn universe_size(&self) -> usize {
        self.state.read().universe.len()
    }

    pub fn config(&self) -> ScreenerConfig {
        self.config.read().clone()
    }

    pub fn set_config(&self, config: ScreenerConfig) {
        *self.config.write() = config;
    }

    /// Put a symbol on cooldown (e.g. after a position is opened on it), so
    /// the next scan skips re-surfacing it for `cooldownMs`.
    pub fn apply_cooldown(&self, symbol: &str) {
        let cooldown_ms = self.config.read().cooldown_ms;
        let mut state = self.state.write();
        if let Some(entry) = state.universe.get_mut(symbol) {
            entry.cooldown_until = Some(Utc::now() + chrono::Duration::milliseconds(cooldown_ms as i64));
        }
    }

    // -------------------------------------------------------------------------
    // Universe initialisation
    // -------------------------------------------------------------------------

    /// Fetch the contract list, filter to USDT-margined linear perpetuals
    /// above `minVolume24h`, sort by turnover descending, and keep the top
    /// `topCoinsCount`. Falls back to a hard-coded symbol list if the
    /// exchange call fails, so the screener still has something to scan.
    pub async fn init_universe(&self) {
        let config = self.config.read().clone();
        let contracts = match self.market.list_contracts().await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "listContracts failed, falling back to default universe");
                fallback_symbols()
                    .into_iter()
                    .map(|symbol| Contract {
                        symbol,
                        is_quanto: false,
                        turnover_24h: 0.0,
                        volume_24h: 0.0,
                        tick_size: 0.0,
                        lot_size: 0.0,
                        multiplier: 1.0,
                        max_leverage: 20.0,
                    })
                    .collect()
            }
        };

        let mut filtered: Vec<Contract> = contracts
            .into_iter()
            .filter(|c| !c.is_quanto && c.turnover_24h >= config.min_volume_24h)
            .collect();
        filtered.sort_by(|a, b| b.turnover_24h.partial_cmp(&a.turnover_24h).unwrap_or(std::cmp::Ordering::Equal));
        filtered.truncate(config.top_coins_count);

        if filtered.is_empty() {
            filtered = fallback_symbols()
                .into_iter()
                .map(|symbol| Contract {
                    symbol,
                    is_quanto: false,
                    turnover_24h: 0.0,
                    volume_24h: 0.0,
                    tick_size: 0.0,
                    lot_size: 0.0,
                    multiplier: 1.0,
                    max_leverage: 20.0,
                })
                .collect();
        }

        let mut state = self.state.write();
        state.universe = filtered
            .into_iter()
            .map(|contract| {
                (
                    contract.symbol.clone(),
                    SymbolState {
                        contract,
                        cooldown_until: None,
                        last_candle_fetch: None,
                    },
                )
            })
            .collect();
        info!(count = state.universe.len(), "screener universe initialised");
    }

    pub fn symbols(&self) -> Vec<String> {
        self.state.read().universe.keys().cloned().collect()
    }

    // -------------------------------------------------------------------------
    // Scan cycle
    // -------------------------------------------------------------------------

    /// Run one full scan across the universe: fetch/refresh candles (30s
    /// cache), compute a signal per symbol, keep the ones passing the
    /// validity filter, rank them, and swap the opportunity list atomically.
    pub async fn scan_cycle(&self) {
        let started = Utc::now();
        let config = self.config.read().clone();
        let symbols = self.symbols();
        let key_interval = format!("{}m", config.candle_granularity_minutes);

        let mut candidates: Vec<Opportunity> = Vec::new();

        for batch in symbols.chunks(config.batch_size) {
            for symbol in batch {
                if self.in_cooldown(symbol) {
                    continue;
                }
                match self.scan_symbol(symbol, &key_interval, &config).await {
                    Some(opp) => candidates.push(opp),
                    None => debug!(symbol = %symbol, "symbol did not pass validity filter"),
                }
            }
            if config.inter_batch_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(config.inter_batch_delay_ms)).await;
            }
        }

        candidates.sort_by(|a, b| b.rank_score.partial_cmp(&a.rank_score).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(config.opportunities_count);

        let duration_ms = (Utc::now() - started).num_milliseconds().max(0) as u64;
        {
            let mut state = self.state.write();
            state.opportunities = candidates.clone();
            state.last_scan_at = Some(started);
            state.last_scan_duration_ms = duration_ms;
        }

        info!(found = candidates.len(), duration_ms, "scan cycle complete");
        self.emit(EngineEvent::Opportunities(candidates));
    }

    fn in_cooldown(&self, symbol: &str) -> bool {
        let state = self.state.read();
        state
            .universe
            .get(symbol)
            .and_then(|s| s.cooldown_until)
            .map(|until| Utc::now() < until)
            .unwrap_or(false)
    }

    /// Score a single symbol, returning `Some(Opportunity)` if it passes the
    /// validity filter (non-neutral, |score| >= threshold, confidence and
    /// confluence floors, tight spread).
    async fn scan_symbol(&self, symbol: &str, interval: &str, config: &ScreenerConfig) -> Option<Opportunity> {
        let candles = self.candles_for(symbol, interval, config).await;
        if candles.len() < MIN_CANDLES_FOR_SCORING {
            return None;
        }

        let orderbook = self.orderbook.get(symbol);
        let (bid_volume, ask_volume) = orderbook.as_ref().map(|b| (b.bid_depth, b.ask_depth)).unwrap_or((0.0, 0.0));
        let dom_result = dom::score(bid_volume, ask_volume);

        let indicator_results = compute_indicator_results(&candles);
        let atr_reading = atr::evaluate(&candles, 14, 2.0, 4.0);

        let signal = aggregate(
            &indicator_results,
            Some(&dom_result),
            atr_reading.as_ref(),
            &self.caps,
            &self.penalties,
            Utc::now().timestamp_millis(),
        );

        if signal.is_neutral() {
            return None;
        }
        if signal.total_score.unsigned_abs() as i32 < config.min_abs_score {
            return None;
        }
        if signal.confidence < config.min_confidence {
            return None;
        }
        if signal.confluence < config.min_confluence {
            return None;
        }

        let last_price = candles.last().map(|c| c.close).unwrap_or(0.0);
        let spread_pct = orderbook
            .as_ref()
            .map(|b| b.spread_bps / 100.0)
            .unwrap_or(0.0);
        if spread_pct > config.max_spread_pct {
            return None;
        }

        let turnover_24h = self.state.read().universe.get(symbol).map(|s| s.contract.turnover_24h).unwrap_or(0.0);
        let rank_score = rank_score(&signal, spread_pct, turnover_24h);

        Some(Opportunity {
            symbol: symbol.to_string(),
            signal,
            rank_score,
            spread_pct,
            turnover_24h,
            last_price,
            discovered_at: Utc::now(),
        })
    }

    /// Candles for `symbol`, refreshed from the exchange if the cache entry
    /// is older than `candleCacheTtlMs` (default 30s), else served from the
    /// shared `CandleBuffer`.
    async fn candles_for(&self, symbol: &str, interval: &str, config: &ScreenerConfig) -> Vec<Candle> {
        let key = CandleKey {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
        };

        let needs_fetch = {
            let state = self.state.read();
            match state.universe.get(symbol).and_then(|s| s.last_candle_fetch) {
                Some(last) => (Utc::now() - last).num_milliseconds() as u64 >= config.candle_cache_ttl_ms,
                None => true,
            }
        };

        if needs_fetch {
            match self.market.fetch_candles(symbol, config.candle_granularity_minutes, config.candle_history).await {
                Ok(fetched) => {
                    for candle in &fetched {
                        self.candle_buffer.update(key.clone(), candle.clone());
                    }
                    let mut state = self.state.write();
                    if let Some(entry) = state.universe.get_mut(symbol) {
                        entry.last_candle_fetch = Some(Utc::now());
                    }
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "fetchCandles failed, using cached candles");
                }
            }
        }

        self.candle_buffer.get_closed(&key, config.candle_history as usize)
    }
}

/// Build the directional-indicator result map (catalog names, fixed period
/// defaults) from a closed-candle series.
fn compute_indicator_results(candles: &[Candle]) -> HashMap<String, IndicatorResult> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let mut results = HashMap::with_capacity(DIRECTIONAL_CATALOG.len());

    results.insert("rsi".to_string(), rsi::score(&closes, 14, 30.0, 70.0));
    results.insert("stoch_rsi".to_string(), stoch_rsi::score(&closes, 14, 14, 3, 3, 20.0, 80.0));
    results.insert("macd".to_string(), macd::score(&closes, 12, 26, 9));
    results.insert("bollinger".to_string(), bollinger::score(&closes, 20, 2.0));
    results.insert("williams_r".to_string(), williams_r::score(candles, 14, -80.0, -20.0));
    results.insert("stochastic".to_string(), stochastic::score(candles, 14, 3, 20.0, 80.0));
    results.insert("ema_trend".to_string(), ema::score(&closes, 10, 25, 50));
    results.insert("awesome_oscillator".to_string(), awesome_oscillator::score(candles, 5, 34));
    results.insert("kdj".to_string(), kdj::score(candles, 9, 20.0, 80.0));
    results.insert("obv".to_string(), obv::score(candles, 20));
    results.insert("cmf".to_string(), cmf::score(candles, 20));
    results.insert("cci".to_string(), cci::score(candles, 20));

    results
}

/// `rankScore = (|score|/220)*100 + confidence*50 + confluence*30 +
/// volumeBonus + strengthBonus - spreadPenalty` (spec.md §4.5).
fn rank_score(signal: &Signal, spread_pct: f64, turnover_24h: f64) -> f64 {
    let magnitude = (signal.total_score.unsigned_abs() as f64 / 220.0) * 100.0;
    let confidence_component = signal.confidence * 50.0;
    let confluence_component = signal.confluence * 30.0;

    let volume_bonus = if turnover_24h >= 100_000_000.0 {
        20.0
    } else if turnover_24h >= 50_000_000.0 {
        15.0
    } else if turnover_24h >= 10_000_000.0 {
        10.0
    } else if turnover_24h >= 5_000_000.0 {
        5.0
    } else {
        0.0
    };

    let strength_bonus = if signal.classification.is_extreme() {
        15.0
    } else if !signal.classification.is_weak() && signal.total_score.unsigned_abs() as i32 >= 90 {
        10.0
    } else {
        0.0
    };

    let spread_penalty = if spread_pct > 0.08 {
        20.0
    } else if spread_pct > 0.05 {
        10.0
    } else {
        0.0
    };

    magnitude + confidence_component + confluence_component + volume_bonus + strength_bonus - spread_penalty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::aggregator::Classification;
    use async_trait::async_trait;

    struct StubMarket;

    #[async_trait]
    impl MarketData for StubMarket {
        async fn list_contracts(&self) -> anyhow::Result<Vec<Contract>> {
            Ok(vec![
                Contract {
                    symbol: "BTCUSDT".into(),
                    is_quanto: false,
                    turnover_24h: 200_000_000.0,
                    volume_24h: 5_000.0,
                    tick_size: 0.1,
                    lot_size: 0.001,
                    multiplier: 1.0,
                    max_leverage: 20.0,
                },
                Contract {
                    symbol: "LOWVOLUSDT".into(),
                    is_quanto: false,
                    turnover_24h: 1_000.0,
                    volume_24h: 1.0,
                    tick_size: 0.1,
                    lot_size: 0.001,
                    multiplier: 1.0,
                    max_leverage: 20.0,
                },
            ])
        }

        async fn fetch_candles(&self, _symbol: &str, _granularity_minutes: u32, _limit: u32) -> anyhow::Result<Vec<Candle>> {
            Ok(Vec::new())
        }

        async fn fetch_funding_rate(&self, _symbol: &str) -> anyhow::Result<Option<f64>> {
            Ok(None)
        }
    }

    fn test_signal(total_score: i32, confidence: f64, confluence: f64) -> Signal {
        Signal {
            total_score,
            indicator_score: total_score,
            microstructure_score: 0,
            classification: Classification::classify(total_score),
            action: Classification::classify(total_score).into(),
            confidence,
            bullish_count: 8,
            bearish_count: 0,
            confluence,
            indicators: HashMap::new(),
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn init_universe_filters_by_min_volume_and_keeps_top_n() {
        let market = Arc::new(StubMarket);
        let screener = Screener::new(market, Arc::new(CandleBuffer::new(500)), Arc::new(OrderBookManager::new()), ScreenerConfig::default());
        screener.init_universe().await;
        let symbols = screener.symbols();
        assert!(symbols.contains(&"BTCUSDT".to_string()));
        assert!(!symbols.contains(&"LOWVOLUSDT".to_string()));
    }

    #[test]
    fn rank_score_rewards_strength_confidence_and_volume() {
        let weak = test_signal(45, 0.7, 0.5);
        let strong = test_signal(200, 0.95, 0.9);
        assert!(rank_score(&strong, 0.0, 200_000_000.0) > rank_score(&weak, 0.0, 0.0));
    }

    #[test]
    fn rank_score_penalises_wide_spread() {
        let signal = test_signal(150, 0.9, 0.8);
        let tight = rank_score(&signal, 0.01, 10_000_000.0);
        let wide = rank_score(&signal, 0.09, 10_000_000.0);
        assert!(wide < tight);
    }

    #[test]
    fn compute_indicator_results_covers_full_catalog() {
        let candles: Vec<Candle> = (0..80)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.3).sin() * 5.0;
                Candle {
                    open_time: i as i64,
                    close_time: i as i64,
                    open: base,
                    high: base + 1.0,
                    low: base - 1.0,
                    close: base + 0.2,
                    volume: 1_000.0,
                    quote_volume: 100_000.0,
                    trades_count: 50,
                    taker_buy_volume: 500.0,
                    taker_buy_quote_volume: 50_000.0,
                    is_closed: true,
                }
            })
            .collect();
        let results = compute_indicator_results(&candles);
        for spec in DIRECTIONAL_CATALOG {
            assert!(results.contains_key(spec.name), "missing {}", spec.name);
        }
    }

    #[test]
    fn cooldown_blocks_rescan_until_expiry() {
        let screener = Screener::new(Arc::new(StubMarket), Arc::new(CandleBuffer::new(500)), Arc::new(OrderBookManager::new()), ScreenerConfig::default());
        {
            let mut state = screener.state.write();
            state.universe.insert(
                "BTCUSDT".to_string(),
                SymbolState {
                    contract: Contract {
                        symbol: "BTCUSDT".into(),
                        is_quanto: false,
                        turnover_24h: 0.0,
                        volume_24h: 0.0,
                        tick_size: 0.0,
                        lot_size: 0.0,
                        multiplier: 1.0,
                        max_leverage: 20.0,
                    },
                    cooldown_until: None,
                    last_candle_fetch: None,
                },
            );
        }
        assert!(!screener.in_cooldown("BTCUSDT"));
        screener.apply_cooldown("BTCUSDT");
        assert!(screener.in_cooldown("BTCUSDT"));
    }
}
