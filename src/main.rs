// =============================================================================
// Perp Screener — Main Entry Point
// =============================================================================
//
// The engine starts in Paper mode always — live order placement is an
// explicit non-goal of this build, so `Mode::Live`/`Mode::Backtest` are
// accepted in config for forward compatibility but never change behavior
// here.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod events;
mod indicators;
mod market_data;
mod paper_trader;
mod risk;
mod runtime_config;
mod screener;
mod signals;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::BinanceClient;
use crate::events::EngineEvent;
use crate::runtime_config::RuntimeConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Perp Screener — Starting Up                       ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = RuntimeConfig::load("runtime_config.json").unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // SAFETY: this build only implements paper trading.
    config.mode = runtime_config::Mode::Paper;

    // Override pinned symbols from env if available; otherwise the screener
    // discovers its own universe from exchange turnover in init_universe().
    if let Ok(syms) = std::env::var("AURORA_SYMBOLS") {
        config.symbols = syms.split(',').map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()).collect();
    }

    info!(mode = %config.mode, pinned_symbols = ?config.symbols, "runtime config loaded");

    // ── 2. Build the Binance market-data client ──────────────────────────
    let binance_client = Arc::new(BinanceClient::new());

    // ── 3. Build shared state ─────────────────────────────────────────────
    let state = Arc::new(AppState::new(config, binance_client));

    // ── 4. Discover the symbol universe, then start the screener ────────
    state.screener.init_universe().await;
    state.screener.start();
    state.increment_version();

    let symbols = state.screener.symbols();
    info!(count = symbols.len(), "screener universe discovered");

    // ── 5. Spawn market-data streams for every symbol in the universe ───
    let candle_interval = format!("{}m", state.runtime_config.read().screener.candle_granularity_minutes);

    for symbol in &symbols {
        // Kline stream — keeps the candle buffer warm between scan cycles'
        // own REST backfill, so a scan never sees stale data mid-cycle.
        {
            let cb = state.candle_buffer.clone();
            let sym = symbol.clone();
            let interval = candle_interval.clone();
            tokio::spawn(async move {
                loop {
                    if let Err(e) = market_data::candle_buffer::run_kline_stream(&sym, &interval, &cb).await {
                        error!(symbol = %sym, error = %e, "kline stream error — reconnecting in 5s");
                    }
                    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                }
            });
        }

        // Trade stream — feeds the paper trader's live-price tick loop.
        {
            let processor = state.trade_processor(symbol);
            let sym = symbol.clone();
            tokio::spawn(async move {
                loop {
                    if let Err(e) = market_data::trade_stream::run_trade_stream(&sym, &processor).await {
                        error!(symbol = %sym, error = %e, "trade stream error — reconnecting in 5s");
                    }
                    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                }
            });
        }

        // Orderbook stream — feeds the DOM microstructure indicator and the
        // screener's spread-based rejection filter.
        {
            let ob = state.orderbook_manager.clone();
            let sym = symbol.clone();
            tokio::spawn(async move {
                loop {
                    if let Err(e) = market_data::orderbook::run_depth_stream(&sym, &ob).await {
                        error!(symbol = %sym, error = %e, "depth stream error — reconnecting in 5s");
                    }
                    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                }
            });
        }
    }

    info!(count = symbols.len(), "market data streams launched");

    // ── 6. Start the API server ───────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = std::env::var("AURORA_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let bind_addr_clone = bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr_clone).await.expect("failed to bind API server");
        info!(addr = %bind_addr_clone, "API server listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    // ── 7. Scan loop (scanIntervalMs) ─────────────────────────────────────
    let scan_state = state.clone();
    tokio::spawn(async move {
        // Let the first round of candle/orderbook streams warm up before the
        // first scan.
        tokio::time::sleep(tokio::time::Duration::from_secs(10)).await;

        loop {
            let interval_ms = scan_state.runtime_config.read().screener.scan_interval_ms;
            if scan_state.screener.is_running() {
                scan_state.screener.scan_cycle().await;
                scan_state.increment_version();
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
        }
    });

    // ── 8. Price-tick loop — keeps open positions' PnL/equity current and
    //      evaluates stop/take/liquidation triggers on every live print ───
    let tick_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(2));
        loop {
            interval.tick().await;
            let open_positions = tick_state.paper_trader.get_open_positions();
            if open_positions.is_empty() {
                continue;
            }
            let mut touched = false;
            for pos in &open_positions {
                let price = tick_state.trade_processor(&pos.symbol).last_price();
                if price > 0.0 {
                    tick_state.paper_trader.tick(&pos.symbol, price);
                    touched = true;
                }
            }
            if touched {
                tick_state.increment_version();
            }
        }
    });

    // ── 9. Status heartbeat — daily risk reset is lazy (checked on every
    //      risk-manager call), so a periodic `get_state()` here ensures the
    //      UTC rollover fires even during a quiet overnight stretch with no
    //      trades ─────────────────────────────────────────────────────────
    let status_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            let _ = status_state.risk_manager.get_state();
            let stats = status_state.paper_trader.get_stats();
            let uptime_s = status_state.start_time.elapsed().as_secs();
            crate::events::publish(&status_state.event_sink, EngineEvent::StatusUpdate { uptime_s, stats });
        }
    });

    info!("all subsystems running — press Ctrl+C to stop");

    // ── 10. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received — stopping gracefully");

    state.screener.stop();

    if let Err(e) = state.runtime_config.read().save("runtime_config.json") {
        error!(error = %e, "failed to save runtime config on shutdown");
    }

    info!("perp screener shut down complete");
    Ok(())
}
