//! # routes::monitor
//!
//! **Market feed** — WebSocket stream plus read-only market endpoints.
//!
//! ## Endpoints
//!
//! | Method    | Path                          | Description                               |
//! |-----------|-------------------------------|-------------------------------------------|
//! | GET (WS)  | `/ws/market`                  | One JSON frame per symbol per tick        |
//! | GET       | `/api/health`                 | Counters, buffers, subscribers, loops     |
//! | GET       | `/api/market/snapshots`       | Latest frame per symbol                   |
//! | GET       | `/api/market/:symbol/history` | Buffered prices, oldest first             |

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, info};

use crate::{error::AppError, events::MarketMessage, state::SharedState};

// ─── WebSocket Handler ────────────────────────────────────────────────────────

/// Upgrade HTTP → WebSocket and attach the socket to the broadcast hub.
///
/// Right after the upgrade the client receives the last frame of every
/// tracked symbol, then one frame per symbol per tick.
pub async fn ws_market(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let mut subscription = state.engine.hub().subscribe().await;
    let id = subscription.id;
    let (mut sender, mut receiver) = socket.split();

    info!(%id, "🔌 WebSocket client connected");

    // ── Event Loop ────────────────────────────────────────────────────────────
    loop {
        tokio::select! {
            // Hub frame → client
            frame = subscription.rx.recv() => {
                match frame {
                    Some(payload) => {
                        if sender.send(Message::Text(payload.to_string())).await.is_err() {
                            break; // Client disconnect
                        }
                    }
                    None => {
                        // Hub dropped us (closed or too slow)
                        debug!(%id, "Subscription closed by hub");
                        break;
                    }
                }
            }

            // Client → server (Ping / Close)
            result = receiver.next() => {
                match result {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    _ => {} // the feed is one-way
                }
            }
        }
    }

    state.engine.hub().unsubscribe(id).await;
    info!(%id, "🔌 WebSocket client disconnected");
}

// ─── REST Endpoints ───────────────────────────────────────────────────────────

/// GET /api/health
pub async fn health(
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.started_at).num_seconds();

    Json(json!({
        "ok":          true,
        "uptimeSecs":  uptime,
        "exchange":    state.config.exchange,
        "symbols":     state.engine.symbols(),
        "subscribers": state.engine.hub().subscriber_count().await,
        "loops":       state.scheduler.status(),
        "stats":       state.engine.stats(),
        "buffers":     state.engine.buffer_stats(),
    }))
}

/// GET /api/market/snapshots — same shape as the WebSocket frames
pub async fn get_snapshots(
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let snapshots = state.engine.hub().latest_snapshots();
    let messages: Vec<MarketMessage<'_>> = snapshots.iter().map(MarketMessage::from).collect();

    Json(json!({
        "ok":        true,
        "count":     messages.len(),
        "snapshots": messages,
    }))
}

/// GET /api/market/:symbol/history
pub async fn get_market_history(
    State(state): State<SharedState>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let symbol = symbol.to_uppercase();
    let prices = state
        .engine
        .history(&symbol)
        .ok_or_else(|| AppError::NotFound(format!("symbol {symbol} is not tracked")))?;

    Ok(Json(json!({
        "ok":       true,
        "symbol":   symbol,
        "capacity": state.config.history_capacity,
        "count":    prices.len(),
        "prices":   prices,
    })))
}
