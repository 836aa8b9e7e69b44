// =============================================================================
// Trade Stream Processor — tracks the last traded price per symbol
// =============================================================================
//
// The spec's `subscribeTicker` only needs `price`/`bestBid`/`bestAsk`/
// `volume24h`/`turnover24h`/`ts` (bestBid/Ask come from `orderbook.rs`).
// CVD and buy-volume-ratio tracking from the teacher's version fed its
// smart-filter absorption detector, which has no counterpart here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use parking_lot::RwLock;
use tokio_tungstenite::connect_async;
use tracing::{error, info, warn};

/// Tracks the last traded price and trade count for a single symbol.
pub struct TradeStreamProcessor {
    symbol: String,
    last_price: RwLock<f64>,
    trade_count: AtomicU64,
}

impl TradeStreamProcessor {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            last_price: RwLock::new(0.0),
            trade_count: AtomicU64::new(0),
        }
    }

    pub fn process_trade(&self, price: f64, _quantity: f64) {
        *self.last_price.write() = price;
        self.trade_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn last_price(&self) -> f64 {
        *self.last_price.read()
    }

    pub fn trade_count(&self) -> u64 {
        self.trade_count.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Trade WebSocket stream
// ---------------------------------------------------------------------------

/// Connect to the Binance USDⓈ-M futures aggTrade stream for a single symbol
/// and feed prices into `processor`. Runs until the stream disconnects or
/// errors, then returns so the caller can handle reconnection.
pub async fn run_trade_stream(symbol: &str, processor: &Arc<TradeStreamProcessor>) -> Result<()> {
    let lower = symbol.to_lowercase();
    let url = format!("wss://fstream.binance.com/ws/{lower}@aggTrade");
    info!(url = %url, symbol = %symbol, "connecting to trade WebSocket");

    let (ws_stream, _response) = connect_async(&url).await.context("failed to connect to trade WebSocket")?;

    info!(symbol = %symbol, "trade WebSocket connected");
    let (_write, mut read) = ws_stream.split();

    loop {
        match read.next().await {
            Some(Ok(msg)) => {
                if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                    match parse_agg_trade(&text) {
                        Ok((price, quantity)) => {
                            processor.process_trade(price, quantity);
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to parse aggTrade message");
                        }
                    }
                }
            }
            Some(Err(e)) => {
                error!(symbol = %symbol, error = %e, "trade WebSocket read error");
                return Err(e.into());
            }
            None => {
                warn!(symbol = %symbol, "trade WebSocket stream ended");
                return Ok(());
            }
        }
    }
}

/// Parse a Binance aggTrade message.
///
/// Expected shape:
/// ```json
/// { "e": "aggTrade", "s": "BTCUSDT", "p": "37000.00", "q": "0.123", "m": true }
/// ```
fn parse_agg_trade(text: &str) -> Result<(f64, f64)> {
    let root: serde_json::Value = serde_json::from_str(text).context("failed to parse aggTrade JSON")?;

    let price: f64 = root["p"].as_str().context("missing field p")?.parse().context("failed to parse price")?;
    let quantity: f64 = root["q"].as_str().context("missing field q")?.parse().context("failed to parse quantity")?;

    Ok((price, quantity))
}
