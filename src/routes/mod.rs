//! HTTP surface: the market WebSocket feed and read-only REST endpoints.

pub mod monitor;
pub mod portfolio;

use axum::{routing::get, Router};

use crate::state::SharedState;

pub fn router(state: SharedState) -> Router {
    Router::new()
        // ── Market Feed ───────────────────────────────────────────────────────
        .route("/ws/market",                     get(monitor::ws_market))
        .route("/api/health",                    get(monitor::health))
        .route("/api/market/snapshots",          get(monitor::get_snapshots))
        .route("/api/market/:symbol/history",    get(monitor::get_market_history))
        // ── Portfolio ─────────────────────────────────────────────────────────
        .route("/api/portfolio/:user_id/value",   get(portfolio::get_value))
        .route("/api/portfolio/:user_id/history", get(portfolio::get_history))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::oracle::heuristic::HeuristicOracle;
    use crate::portfolio::InMemoryLedger;
    use crate::state::AppState;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use futures_util::StreamExt;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn state() -> SharedState {
        Arc::new(AppState::new(
            Config::default(),
            Arc::new(HeuristicOracle),
            Arc::new(InMemoryLedger::with_demo_user().await),
        ))
    }

    async fn get_json(state: SharedState, uri: &str) -> (StatusCode, Value) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_loops_and_symbols() {
        let (status, body) = get_json(state().await, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["symbols"], serde_json::json!(["BTC", "ETH", "SOL"]));
        assert_eq!(body["loops"]["market"], false);
        assert_eq!(body["subscribers"], 0);
        assert_eq!(body["buffers"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn market_history_and_snapshots_follow_ticks() {
        let state = state().await;
        state.engine.process_symbol("BTC").await.unwrap();
        state.engine.process_symbol("BTC").await.unwrap();

        let (status, body) = get_json(Arc::clone(&state), "/api/market/btc/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["capacity"], 100);

        let (_, body) = get_json(state, "/api/market/snapshots").await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["snapshots"][0]["symbol"], "BTC");
        assert_eq!(body["snapshots"][0]["exchange"], "binance");
    }

    #[tokio::test]
    async fn unknown_symbol_is_404_with_error_body() {
        let (status, body) = get_json(state().await, "/api/market/DOGE/history").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn demo_portfolio_is_valued_at_seed_prices() {
        let (status, body) = get_json(state().await, "/api/portfolio/demo/value").await;
        assert_eq!(status, StatusCode::OK);
        // 0.5 × 95 000 + 2 × 3 500 + 25 × 180
        assert_eq!(body["totalValue"], 59_000.0);
    }

    #[tokio::test]
    async fn portfolio_history_validates_timeframe() {
        let (status, body) = get_json(state().await, "/api/portfolio/demo/history?timeframe=1w").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["timeframe"], "1W");
        assert_eq!(body["count"], 3);
        assert_eq!(body["points"][0]["kind"], "trade");

        let (status, body) = get_json(state().await, "/api/portfolio/demo/history?timeframe=5Y").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn websocket_client_gets_catch_up_then_live_frames() {
        let state = state().await;
        state.engine.process_symbol("ETH").await.unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::clone(&state));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/market"))
            .await
            .unwrap();

        type Client = tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >;

        async fn next_frame(socket: &mut Client) -> Value {
            let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            serde_json::from_str(message.to_text().unwrap()).unwrap()
        }

        // catch-up: the frame published before the client connected
        let frame = next_frame(&mut socket).await;
        assert_eq!(frame["symbol"], "ETH");
        assert_eq!(frame["exchange"], "binance");
        assert_eq!(frame["price"], state.engine.latest_prices()["ETH"]);
        assert_eq!(state.engine.hub().subscriber_count().await, 1);

        let published = state.engine.process_symbol("BTC").await.unwrap();
        let frame = next_frame(&mut socket).await;
        assert_eq!(frame["symbol"], "BTC");
        assert_eq!(frame["timestamp"], published.timestamp.timestamp());

        socket.close(None).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.engine.hub().subscriber_count().await > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}
