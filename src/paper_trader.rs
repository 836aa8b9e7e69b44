// =============================================================================
// Paper Trader — simulated fills, position lifecycle, account/PnL accounting
// =============================================================================
//
// Grounded on `position_engine.rs`'s RwLock<Vec<Position>>-owned state and
// UUID-keyed lifecycle, generalized to the spec's LONG/SHORT position model
// with margin/liquidation accounting instead of the teacher's TP1/TP2/
// trailing-stop ladder. The account is a single value owned here; the risk
// manager only ever receives ids and realized PnL (see risk.rs).
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::events::{publish, EngineEvent, EventSink};
use crate::risk::RiskManager;
use crate::signals::aggregator::Signal;
use crate::types::Side;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    Manual,
    CloseAll,
    Liquidation,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopLoss => write!(f, "stop_loss"),
            Self::TakeProfit => write!(f, "take_profit"),
            Self::Manual => write!(f, "manual"),
            Self::CloseAll => write!(f, "close_all"),
            Self::Liquidation => write!(f, "liquidation"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub leverage: f64,
    pub margin: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub unrealized_pnl: f64,
    pub open_fee: f64,
    /// Totalscore/classification at entry, carried for later review. Not the
    /// full indicator map — just enough to explain why the trade was taken.
    pub signal_snapshot: SignalSnapshot,
    pub open_time: DateTime<Utc>,
    pub status: PositionStatus,

    #[serde(default)]
    pub close_price: Option<f64>,
    #[serde(default)]
    pub close_fee: Option<f64>,
    #[serde(default)]
    pub realized_pnl: Option<f64>,
    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub close_reason: Option<CloseReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub total_score: i32,
    pub classification: String,
    pub confidence: f64,
}

impl From<&Signal> for SignalSnapshot {
    fn from(signal: &Signal) -> Self {
        Self {
            total_score: signal.total_score,
            classification: signal.classification.as_str().to_string(),
            confidence: signal.confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub balance: f64,
    pub equity: f64,
    pub margin: f64,
    pub free_margin: f64,
    pub realized_profit: f64,
}

impl Account {
    fn new(initial_balance: f64) -> Self {
        Self {
            balance: initial_balance,
            equity: initial_balance,
            margin: 0.0,
            free_margin: initial_balance,
            realized_profit: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub peak_equity: f64,
    pub max_drawdown: f64,
    pub started_at: DateTime<Utc>,
}

impl Stats {
    fn new(initial_equity: f64) -> Self {
        Self {
            total_trades: 0,
            wins: 0,
            losses: 0,
            gross_profit: 0.0,
            gross_loss: 0.0,
            peak_equity: initial_equity,
            max_drawdown: 0.0,
            started_at: Utc::now(),
        }
    }

    fn record_close(&mut self, net_pnl: f64, equity_after: f64) {
        self.total_trades += 1;
        if net_pnl >= 0.0 {
            self.wins += 1;
            self.gross_profit += net_pnl;
        } else {
            self.losses += 1;
            self.gross_loss += -net_pnl;
        }
        if equity_after > self.peak_equity {
            self.peak_equity = equity_after;
        }
        let drawdown = if self.peak_equity > 0.0 {
            (self.peak_equity - equity_after) / self.peak_equity
        } else {
            0.0
        };
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.total_trades as f64
        }
    }

    pub fn profit_factor(&self) -> f64 {
        if self.gross_loss == 0.0 {
            if self.gross_profit > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            self.gross_profit / self.gross_loss
        }
    }

    pub fn avg_win(&self) -> f64 {
        if self.wins == 0 {
            0.0
        } else {
            self.gross_profit / self.wins as f64
        }
    }

    pub fn avg_loss(&self) -> f64 {
        if self.losses == 0 {
            0.0
        } else {
            self.gross_loss / self.losses as f64
        }
    }

    pub fn expectancy(&self) -> f64 {
        let win_rate = self.win_rate();
        win_rate * self.avg_win() - (1.0 - win_rate) * self.avg_loss()
    }

    pub fn roi(&self, initial_balance: f64) -> f64 {
        if initial_balance <= 0.0 {
            0.0
        } else {
            (self.gross_profit - self.gross_loss) / initial_balance
        }
    }

    pub fn running_days(&self) -> f64 {
        (Utc::now() - self.started_at).num_seconds() as f64 / 86_400.0
    }

    pub fn annualized_return(&self, initial_balance: f64) -> f64 {
        let days = self.running_days();
        if days <= 0.0 {
            return 0.0;
        }
        self.roi(initial_balance) * (365.0 / days)
    }
}

// ---------------------------------------------------------------------------
// Trade log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeRecordKind {
    Open,
    Close,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub position_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub kind: TradeRecordKind,
    pub price: f64,
    pub size: f64,
    pub fee: f64,
    pub realized_pnl: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperTraderConfig {
    #[serde(default = "defaults::taker_fee")]
    pub taker_fee: f64,
    #[serde(default = "defaults::maker_fee")]
    pub maker_fee: f64,
    #[serde(default = "defaults::slippage")]
    pub slippage: f64,
    #[serde(default = "defaults::initial_balance")]
    pub initial_balance: f64,
}

mod defaults {
    pub fn taker_fee() -> f64 {
        0.0006
    }
    pub fn maker_fee() -> f64 {
        0.0002
    }
    pub fn slippage() -> f64 {
        0.0003
    }
    pub fn initial_balance() -> f64 {
        10_000.0
    }
}

impl Default for PaperTraderConfig {
    fn default() -> Self {
        Self {
            taker_fee: defaults::taker_fee(),
            maker_fee: defaults::maker_fee(),
            slippage: defaults::slippage(),
            initial_balance: defaults::initial_balance(),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

struct Inner {
    account: Account,
    positions: HashMap<Uuid, Position>,
    closed: Vec<Position>,
    trade_log: Vec<TradeRecord>,
    stats: Stats,
}

// ---------------------------------------------------------------------------
// PaperTrader
// ---------------------------------------------------------------------------

pub struct PaperTrader {
    config: PaperTraderConfig,
    risk: std::sync::Arc<RiskManager>,
    sink: Option<EventSink>,
    state: RwLock<Inner>,
}

impl PaperTrader {
    pub fn new(config: PaperTraderConfig, risk: std::sync::Arc<RiskManager>, sink: Option<EventSink>) -> Self {
        let initial_balance = config.initial_balance;
        Self {
            config,
            risk,
            sink,
            state: RwLock::new(Inner {
                account: Account::new(initial_balance),
                positions: HashMap::new(),
                closed: Vec::new(),
                trade_log: Vec::new(),
                stats: Stats::new(initial_balance),
            }),
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.sink {
            publish(sink, event);
        }
    }

    // -------------------------------------------------------------------
    // Open (§4.4)
    // -------------------------------------------------------------------

    /// Open a position against `signal` at `market_price`. Returns
    /// `Err(reason)` for every rejection path — insufficient size from the
    /// risk gates, or insufficient free margin — never a panic.
    pub fn open(&self, symbol: &str, signal: &Signal, market_price: f64) -> Result<Position, String> {
        let equity = self.state.read().account.equity;
        let decision = self.risk.size_position(signal, equity, market_price);
        if decision.reason.is_some() || decision.size <= 0.0 {
            let reason = decision.reason.unwrap_or_else(|| "zero size".to_string());
            return Err(reason);
        }

        let fill_price = match decision.side {
            Side::Long => market_price * (1.0 + self.config.slippage),
            Side::Short => market_price * (1.0 - self.config.slippage),
        };

        let notional = decision.size * fill_price;
        let margin = notional / decision.leverage;
        let open_fee = notional * self.config.taker_fee;

        let mut s = self.state.write();
        if margin > s.account.free_margin {
            return Err(format!(
                "Insufficient margin: need {:.2}, have {:.2}",
                margin, s.account.free_margin
            ));
        }

        let id = Uuid::new_v4();
        let position = Position {
            id,
            symbol: symbol.to_string(),
            side: decision.side,
            size: decision.size,
            entry_price: fill_price,
            current_price: fill_price,
            leverage: decision.leverage,
            margin,
            stop_loss: decision.stop_loss,
            take_profit: decision.take_profit,
            unrealized_pnl: 0.0,
            open_fee,
            signal_snapshot: SignalSnapshot::from(signal),
            open_time: Utc::now(),
            status: PositionStatus::Open,
            close_price: None,
            close_fee: None,
            realized_pnl: None,
            close_time: None,
            close_reason: None,
        };

        s.account.margin += margin;
        s.account.free_margin -= margin;
        s.account.balance -= open_fee;
        s.account.equity = s.account.balance + total_unrealized(&s.positions);

        s.trade_log.push(TradeRecord {
            position_id: id,
            symbol: symbol.to_string(),
            side: decision.side,
            kind: TradeRecordKind::Open,
            price: fill_price,
            size: decision.size,
            fee: open_fee,
            realized_pnl: None,
            timestamp: Utc::now(),
        });
        s.positions.insert(id, position.clone());
        drop(s);

        self.risk.track_position(id);
        info!(id = %id, symbol, side = %decision.side, fill_price, size = decision.size, leverage = decision.leverage, "position opened");
        self.emit(EngineEvent::PositionOpened(position.clone()));

        Ok(position)
    }

    // -------------------------------------------------------------------
    // Price tick (§4.4)
    // -------------------------------------------------------------------

    /// Update all open positions on `symbol` with a fresh price, firing stop
    /// loss / take profit exits as they trigger. Liquidation-buffer breaches
    /// only emit a warning; the operator decides whether to close.
    pub fn tick(&self, symbol: &str, price: f64) {
        let ids: Vec<Uuid> = {
            let s = self.state.read();
            s.positions
                .values()
                .filter(|p| p.symbol == symbol)
                .map(|p| p.id)
                .collect()
        };

        for id in ids {
            let (should_close, reason) = {
                let mut s = self.state.write();
                let Some(pos) = s.positions.get_mut(&id) else { continue };
                pos.current_price = price;
                pos.unrealized_pnl = match pos.side {
                    Side::Long => (price - pos.entry_price) * pos.size,
                    Side::Short => (pos.entry_price - price) * pos.size,
                };
                s.account.equity = s.account.balance + total_unrealized(&s.positions);
                s.account.free_margin = s.account.equity - s.account.margin;

                let pos = s.positions.get(&id).expect("just inserted");
                let sl_hit = match pos.side {
                    Side::Long => price <= pos.stop_loss,
                    Side::Short => price >= pos.stop_loss,
                };
                let tp_hit = match pos.side {
                    Side::Long => price >= pos.take_profit,
                    Side::Short => price <= pos.take_profit,
                };

                if sl_hit {
                    (true, CloseReason::StopLoss)
                } else if tp_hit {
                    (true, CloseReason::TakeProfit)
                } else {
                    let check = self.risk.liquidation_check(pos.entry_price, price, pos.leverage, pos.side);
                    if !check.safe {
                        warn!(id = %id, symbol, buffer = check.buffer, liquidation_price = check.liquidation_price, "liquidation buffer unsafe");
                    }
                    (false, CloseReason::Manual)
                }
            };

            if should_close {
                let _ = self.close(id, price, reason);
            }
        }
    }

    // -------------------------------------------------------------------
    // Close (§4.4)
    // -------------------------------------------------------------------

    pub fn close(&self, id: Uuid, price: f64, reason: CloseReason) -> Option<Position> {
        let mut s = self.state.write();
        let mut position = s.positions.remove(&id)?;

        let fill_price = match position.side {
            Side::Long => price * (1.0 - self.config.slippage),
            Side::Short => price * (1.0 + self.config.slippage),
        };
        let notional = position.size * fill_price;
        let close_fee = notional * self.config.taker_fee;
        let gross_pnl = match position.side {
            Side::Long => (fill_price - position.entry_price) * position.size,
            Side::Short => (position.entry_price - fill_price) * position.size,
        };
        let net_pnl = gross_pnl - position.open_fee - close_fee;

        s.account.margin -= position.margin;
        s.account.free_margin += position.margin;
        s.account.balance += net_pnl;
        s.account.realized_profit += net_pnl;
        s.account.equity = s.account.balance + total_unrealized(&s.positions);
        s.account.free_margin = s.account.equity - s.account.margin;

        position.close_price = Some(fill_price);
        position.close_fee = Some(close_fee);
        position.realized_pnl = Some(net_pnl);
        position.close_time = Some(Utc::now());
        position.close_reason = Some(reason);
        position.status = PositionStatus::Closed;
        position.unrealized_pnl = 0.0;

        s.stats.record_close(net_pnl, s.account.equity);

        s.trade_log.push(TradeRecord {
            position_id: id,
            symbol: position.symbol.clone(),
            side: position.side,
            kind: TradeRecordKind::Close,
            price: fill_price,
            size: position.size,
            fee: close_fee,
            realized_pnl: Some(net_pnl),
            timestamp: Utc::now(),
        });
        s.closed.push(position.clone());
        drop(s);

        self.risk.untrack_position(id);
        self.risk.record_trade_result(net_pnl);

        info!(id = %id, symbol = %position.symbol, reason = %reason, net_pnl, "position closed");
        self.emit(EngineEvent::PositionClosed {
            position: position.clone(),
            trade: TradeRecord {
                position_id: id,
                symbol: position.symbol.clone(),
                side: position.side,
                kind: TradeRecordKind::Close,
                price: fill_price,
                size: position.size,
                fee: close_fee,
                realized_pnl: Some(net_pnl),
                timestamp: Utc::now(),
            },
        });
        self.emit(EngineEvent::TradeRecorded {
            position_id: id.to_string(),
            pnl: net_pnl,
            consecutive_losses: self.risk.get_state().consecutive_losses,
        });

        Some(position)
    }

    /// Close every open position at its last known price (operator
    /// `close_all` command).
    pub fn close_all(&self) -> Vec<Position> {
        let ids: Vec<(Uuid, f64)> = {
            let s = self.state.read();
            s.positions.values().map(|p| (p.id, p.current_price)).collect()
        };
        ids.into_iter()
            .filter_map(|(id, price)| self.close(id, price, CloseReason::CloseAll))
            .collect()
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    pub fn get_account(&self) -> Account {
        self.state.read().account.clone()
    }

    pub fn get_open_positions(&self) -> Vec<Position> {
        self.state.read().positions.values().cloned().collect()
    }

    pub fn get_closed_positions(&self, count: usize) -> Vec<Position> {
        let s = self.state.read();
        s.closed.iter().rev().take(count).cloned().collect()
    }

    pub fn get_stats(&self) -> Stats {
        self.state.read().stats.clone()
    }

    pub fn get_trade_log(&self, count: usize) -> Vec<TradeRecord> {
        let s = self.state.read();
        s.trade_log.iter().rev().take(count).cloned().collect()
    }

    /// Restore the account to its initial balance and clear all history.
    /// Does not reset the risk manager's circuit breaker — that is an
    /// explicit, separate operator command.
    pub fn reset(&self) {
        let mut s = self.state.write();
        let initial_balance = self.config.initial_balance;
        s.account = Account::new(initial_balance);
        s.positions.clear();
        s.closed.clear();
        s.trade_log.clear();
        s.stats = Stats::new(initial_balance);
        info!("paper trader reset to initial balance");
    }
}

fn total_unrealized(positions: &HashMap<Uuid, Position>) -> f64 {
    positions.values().map(|p| p.unrealized_pnl).sum()
}

impl std::fmt::Debug for PaperTrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.state.read();
        f.debug_struct("PaperTrader")
            .field("open_positions", &s.positions.len())
            .field("balance", &s.account.balance)
            .finish()
    }
}
