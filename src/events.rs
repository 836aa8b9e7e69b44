// =============================================================================
// Event bus — tagged-variant enum + broadcast sink
// =============================================================================
//
// §9 design note: prefer an explicit event-bus capability (a tagged-variant
// enum of events plus a broadcast sink) over per-component emitters. Every
// subsystem that produces a dashboard-visible event sends one `EngineEvent`
// down a shared `broadcast::Sender`; consumers (the WebSocket handler, a
// logger, a test harness) each get their own receiver.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::app_state::StateSnapshot;
use crate::paper_trader::{Position, Stats, TradeRecord};
use crate::risk::RiskState;
use crate::screener::Opportunity;
use crate::signals::aggregator::Signal;

/// Depth of the broadcast channel's internal ring buffer. Slow consumers
/// that fall this far behind receive `RecvError::Lagged` rather than
/// blocking producers — the scan loop and price-tick loop must never stall
/// waiting on a dashboard.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub type EventSink = broadcast::Sender<EngineEvent>;

pub fn new_event_bus() -> EventSink {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

/// Every message a dashboard consumer may receive (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    Opportunities(Vec<Opportunity>),
    Signal { symbol: String, signal: Signal },
    PositionOpened(Position),
    PositionClosed { position: Position, trade: TradeRecord },
    AccountUpdate(StateSnapshot),
    CircuitBreaker(RiskState),
    TradeRecorded { position_id: String, pnl: f64, consecutive_losses: u32 },
    ScreenerStarted,
    ScreenerStopped,
    StatusUpdate { uptime_s: u64, stats: Stats },
}

/// Publish helper that never panics on a channel with zero subscribers — the
/// screener and paper trader run fine with no dashboard attached.
pub fn publish(sink: &EventSink, event: EngineEvent) {
    let _ = sink.send(event);
}
