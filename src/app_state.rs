// =============================================================================
// Central Application State — perpetual futures screener engine
// =============================================================================
//
// The single source of truth tying the market-data layer, the screener, the
// risk manager, and the paper trader together. Every subsystem manages its
// own interior mutability (a `parking_lot::RwLock` behind its own struct);
// `AppState` just holds `Arc`s to each one and knows how to build a single
// serialisable snapshot for the dashboard API and WebSocket feed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::binance::BinanceClient;
use crate::events::{new_event_bus, EventSink};
use crate::market_data::{CandleBuffer, OrderBookManager, TradeStreamProcessor};
use crate::paper_trader::{Account, PaperTrader, Position, Stats};
use crate::risk::{RiskManager, RiskState};
use crate::runtime_config::RuntimeConfig;
use crate::screener::{Opportunity, Screener};

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, bumped on every meaningful
    /// mutation so the WebSocket feed can detect staleness cheaply.
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    pub event_sink: EventSink,

    // ── Market data ──────────────────────────────────────────────────────
    pub candle_buffer: Arc<CandleBuffer>,
    pub orderbook_manager: Arc<OrderBookManager>,
    pub trade_processors: RwLock<HashMap<String, Arc<TradeStreamProcessor>>>,

    // ── Core engine ──────────────────────────────────────────────────────
    pub screener: Arc<Screener<BinanceClient>>,
    pub risk_manager: Arc<RiskManager>,
    pub paper_trader: Arc<PaperTrader>,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig, market: Arc<BinanceClient>) -> Self {
        let candle_buffer = Arc::new(CandleBuffer::new(500));
        let orderbook_manager = Arc::new(OrderBookManager::new());
        let event_sink = new_event_bus();

        let screener = Arc::new(
            Screener::with_caps(
                market,
                candle_buffer.clone(),
                orderbook_manager.clone(),
                config.screener.clone(),
                config.caps.clone(),
                config.confidence_penalties.clone(),
            )
            .with_event_sink(event_sink.clone()),
        );

        let risk_manager = Arc::new(
            RiskManager::new(config.risk.clone(), config.paper_trader.initial_balance)
                .with_event_sink(event_sink.clone()),
        );

        let paper_trader = Arc::new(PaperTrader::new(config.paper_trader.clone(), risk_manager.clone(), Some(event_sink.clone())));

        Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(RwLock::new(config)),
            event_sink,

            candle_buffer,
            orderbook_manager,
            trade_processors: RwLock::new(HashMap::new()),

            screener,
            risk_manager,
            paper_trader,

            start_time: std::time::Instant::now(),
        }
    }

    /// Atomically increment the state version. Call after every meaningful
    /// mutation so WebSocket clients know fresh data is available.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    /// Lazily create (and remember) a trade-stream processor for `symbol`,
    /// returning the shared handle used by both the WebSocket task and the
    /// price-tick loop.
    pub fn trade_processor(&self, symbol: &str) -> Arc<TradeStreamProcessor> {
        if let Some(existing) = self.trade_processors.read().get(symbol) {
            return existing.clone();
        }
        let processor = Arc::new(TradeStreamProcessor::new(symbol));
        self.trade_processors.write().insert(symbol.to_string(), processor.clone());
        processor
    }

    /// Build a complete, serialisable snapshot of the engine state. This is
    /// the payload sent to the dashboard via `GET /api/v1/state` and the
    /// WebSocket push feed.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let now = Utc::now();
        let version = self.current_state_version();
        let screener_running = self.screener.is_running();
        let risk_state = self.risk_manager.get_state();
        let account = self.paper_trader.get_account();
        let stats = self.paper_trader.get_stats();
        let open_positions = self.paper_trader.get_open_positions();
        let opportunities = self.screener.get_opportunities();

        StateSnapshot {
            state_version: version,
            server_time: now.timestamp_millis(),
            uptime_s: self.start_time.elapsed().as_secs(),
            screener_running,
            universe_size: self.screener.universe_size(),
            opportunities,
            account,
            stats,
            open_positions,
            risk: risk_state,
        }
    }
}

// =============================================================================
// Serialisable snapshot
// =============================================================================

/// Full engine state snapshot sent to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_s: u64,
    pub screener_running: bool,
    pub universe_size: usize,
    pub opportunities: Vec<Opportunity>,
    pub account: Account,
    pub stats: Stats,
    pub open_positions: Vec<Position>,
    pub risk: RiskState,
}
