// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. `/api/v1/health` is public; every
// other route requires a valid Bearer token via the `AuthBearer` extractor.
// This surfaces exactly the operator command set a dashboard needs:
// start/stop/scan the screener, read the full state snapshot, and drive the
// paper trader (open/close/close_all/reset_account/reset_circuit_breaker).

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::paper_trader::CloseReason;
use crate::types::Side;

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(get_state))
        .route("/api/v1/opportunities", get(get_opportunities))
        .route("/api/v1/positions", get(get_positions))
        .route("/api/v1/trade-journal", get(trade_journal))
        .route("/api/v1/control/start-screener", post(start_screener))
        .route("/api/v1/control/stop-screener", post(stop_screener))
        .route("/api/v1/control/scan-now", post(scan_now))
        .route("/api/v1/control/open", post(open_position))
        .route("/api/v1/control/close", post(close_position))
        .route("/api/v1/control/close-all", post(close_all))
        .route("/api/v1/control/reset-account", post(reset_account))
        .route("/api/v1/control/reset-circuit-breaker", post(reset_circuit_breaker))
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    universe_size: usize,
    screener_running: bool,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        universe_size: state.screener.universe_size(),
        screener_running: state.screener.is_running(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// get_state / opportunities / positions / journal (authenticated)
// =============================================================================

async fn get_state(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn get_opportunities(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.screener.get_opportunities())
}

async fn get_positions(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.paper_trader.get_open_positions())
}

#[derive(Deserialize)]
struct TradeJournalQuery {
    #[serde(default = "default_trade_journal_count")]
    count: usize,
}

fn default_trade_journal_count() -> usize {
    100
}

async fn trade_journal(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Query(query): Query<TradeJournalQuery>,
) -> impl IntoResponse {
    Json(state.paper_trader.get_trade_log(query.count))
}

// =============================================================================
// start_screener / stop_screener / scan_now
// =============================================================================

#[derive(Serialize)]
struct ScreenerStatusResponse {
    screener_running: bool,
}

async fn start_screener(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.screener.universe_size() == 0 {
        state.screener.init_universe().await;
    }
    state.screener.start();
    state.increment_version();
    Json(ScreenerStatusResponse { screener_running: true })
}

async fn stop_screener(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.screener.stop();
    state.increment_version();
    Json(ScreenerStatusResponse { screener_running: false })
}

async fn scan_now(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.screener.scan_cycle().await;
    state.increment_version();
    Json(state.screener.get_opportunities())
}

// =============================================================================
// open / close / close_all
// =============================================================================

#[derive(Deserialize)]
struct OpenRequest {
    symbol: String,
    side: String,
    #[serde(default)]
    price: Option<f64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Manual open: the dashboard names a symbol currently sitting in the
/// opportunity list (and the side it expects, which must agree with that
/// opportunity's signal) — a manual open has no signal of its own to gate on,
/// so it rides the screener's last computed one.
async fn open_position(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let requested_side = match req.side.to_uppercase().as_str() {
        "LONG" | "BUY" => Side::Long,
        "SHORT" | "SELL" => Side::Short,
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: format!("invalid side '{other}', expected LONG or SHORT") }),
            ))
        }
    };

    let opportunity = state
        .screener
        .get_opportunities()
        .into_iter()
        .find(|o| o.symbol == req.symbol)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse { error: format!("no current opportunity for {}; run scan_now first", req.symbol) }),
            )
        })?;

    let implied_side = if opportunity.signal.classification.is_bullish_half() { Side::Long } else { Side::Short };
    if implied_side != requested_side {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: format!("requested side {requested_side} does not match signal side {implied_side} for {}", req.symbol) }),
        ));
    }

    let price = req.price.unwrap_or(opportunity.last_price);
    match state.paper_trader.open(&req.symbol, &opportunity.signal, price) {
        Ok(position) => {
            state.screener.apply_cooldown(&req.symbol);
            state.increment_version();
            info!(symbol = %req.symbol, side = %requested_side, "position opened via API");
            Ok(Json(position).into_response())
        }
        Err(reason) => {
            warn!(symbol = %req.symbol, reason = %reason, "manual open rejected");
            Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error: reason })))
        }
    }
}

#[derive(Deserialize)]
struct CloseRequest {
    position_id: Uuid,
    #[serde(default)]
    price: Option<f64>,
}

async fn close_position(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CloseRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let price = req.price.or_else(|| {
        state
            .paper_trader
            .get_open_positions()
            .into_iter()
            .find(|p| p.id == req.position_id)
            .map(|p| p.current_price)
    });

    let Some(price) = price else {
        return Err((StatusCode::NOT_FOUND, Json(ErrorResponse { error: "position not found".to_string() })));
    };

    match state.paper_trader.close(req.position_id, price, CloseReason::Manual) {
        Some(position) => {
            state.increment_version();
            Ok(Json(position).into_response())
        }
        None => Err((StatusCode::NOT_FOUND, Json(ErrorResponse { error: "position not found".to_string() }))),
    }
}

async fn close_all(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let closed = state.paper_trader.close_all();
    state.increment_version();
    warn!(count = closed.len(), "close_all invoked via API");
    Json(closed)
}

// =============================================================================
// reset_account / reset_circuit_breaker
// =============================================================================

async fn reset_account(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.paper_trader.reset();
    state.increment_version();
    warn!("account reset via API");
    Json(state.paper_trader.get_account())
}

async fn reset_circuit_breaker(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.risk_manager.reset_circuit_breaker();
    state.increment_version();
    warn!("circuit breaker reset via API");
    Json(state.risk_manager.get_state())
}
