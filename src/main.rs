//! # Market Pulse — Real-Time Market Analytics Backend
//!
//! ```text
//!  ┌──────────────┐ every tick  ┌──────────────────────────────┐
//!  │ Market loop  │ ──────────▶ │ MarketEngine                 │
//!  └──────────────┘  per symbol │ ├─ history   (ring buffers)  │
//!                               │ ├─ patterns  volatility      │
//!                               │ ├─ cache ──▶ AdvisoryOracle  │  (AI / heuristic)
//!                               │ └─ hub ─────────────────────┐│
//!                               └─────────────────────────────┼┘
//!  ┌──────────────┐                                           │
//!  │ Dashboard    │  ws://host/ws/market  ◀───────────────────┘
//!  └──────────────┘  GET /api/market/*  /api/portfolio/*  /api/health
//!
//!  ┌──────────────┐ every tick  ┌──────────────────┐      ┌──────────────┐
//!  │ Portfolio    │ ──────────▶ │ PortfolioValuer  │ ───▶ │ LedgerStore  │
//!  │ loop         │             └──────────────────┘      └──────────────┘
//!  └──────────────┘
//! ```

use anyhow::Context;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod engine;
mod error;
mod events;
mod hub;
mod models;
mod oracle;
mod portfolio;
mod routes;
mod scheduler;
mod state;

use config::Config;
use state::build_state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("market_pulse=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════════════════╗
  ║            MARKET PULSE — Analytics Backend           ║
  ║  Ticks · Patterns · Volatility · Advisory · Portfolio ║
  ╚═══════════════════════════════════════════════════════╝"#);

    // ── 3. Config & shared state ──────────────────────────────────────────────
    let config = Config::from_env().context("Failed to load config")?;
    let addr = config.bind_addr;

    info!(
        exchange  = %config.exchange,
        symbols   = ?config.symbol_names(),
        provider  = %config.advisory.provider,
        tick      = ?config.tick_interval,
        portfolio = ?config.portfolio_interval,
        "Configuration loaded"
    );

    let state = build_state(config).await?;

    // ── 4. Loops ──────────────────────────────────────────────────────────────
    state.scheduler.start();

    // ── 5. CORS ───────────────────────────────────────────────────────────────
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // ── 6. Router ─────────────────────────────────────────────────────────────
    let app = routes::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // ── 7. Bind & Serve ───────────────────────────────────────────────────────
    info!(?addr, "🚀 Market Pulse server starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ── 8. Drain loops ────────────────────────────────────────────────────────
    state.scheduler.stop().await;
    info!("👋 Market Pulse stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}
