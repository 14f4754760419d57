//! # state
//!
//! AppState — the explicitly constructed object graph shared by the loops
//! and every Axum handler.
//!
//! ```text
//!  AppState
//!   ├─ engine    (history, quotes, detector, volatility, cache, hub)
//!   ├─ valuer    (ledger store)
//!   └─ scheduler (market loop → engine, portfolio loop → valuer)
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::Config;
use crate::engine::{MarketEngine, RandomWalk};
use crate::hub::BroadcastHub;
use crate::oracle::{build_oracle, AdvisoryOracle};
use crate::portfolio::{InMemoryLedger, LedgerStore, PortfolioValuer};
use crate::scheduler::Scheduler;

// ─── AppState ─────────────────────────────────────────────────────────────────

/// Top-level shared state injected into every Axum handler.
pub struct AppState {
    pub config:     Config,

    // ── Market ────────────────────────────────────────────────────────────────
    /// Owns the broadcast hub; WebSocket handlers subscribe through it.
    pub engine:     Arc<MarketEngine>,

    // ── Portfolio ─────────────────────────────────────────────────────────────
    pub valuer:     Arc<PortfolioValuer>,

    // ── Loops ─────────────────────────────────────────────────────────────────
    pub scheduler:  Scheduler,

    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, oracle: Arc<dyn AdvisoryOracle>, ledger: Arc<dyn LedgerStore>) -> Self {
        let hub = Arc::new(BroadcastHub::from_config(&config.broadcast));
        let engine = Arc::new(MarketEngine::new(
            &config,
            oracle,
            Arc::new(RandomWalk::new(config.walk_step)),
            hub,
        ));
        let valuer = Arc::new(PortfolioValuer::new(ledger));
        let scheduler = Scheduler::new(
            Arc::clone(&engine),
            Arc::clone(&valuer),
            config.tick_interval,
            config.portfolio_interval,
        );

        Self {
            config,
            engine,
            valuer,
            scheduler,
            started_at: Utc::now(),
        }
    }
}

/// Convenience type alias
pub type SharedState = Arc<AppState>;

/// Wire the oracle and ledger selected by `config` into a fresh state.
pub async fn build_state(config: Config) -> anyhow::Result<SharedState> {
    let http_client = reqwest::Client::new();
    let oracle = build_oracle(&config.advisory, http_client);
    let ledger = build_ledger(&config).await?;

    info!(
        oracle  = oracle.name(),
        symbols = ?config.symbol_names(),
        "🧩 State assembled"
    );
    Ok(Arc::new(AppState::new(config, oracle, ledger)))
}

#[cfg(feature = "postgres")]
async fn build_ledger(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    if let Some(url) = &config.database_url {
        let pool = crate::portfolio::db::init_pool(url).await?;
        return Ok(Arc::new(crate::portfolio::db::PgLedger::new(pool)));
    }
    Ok(Arc::new(InMemoryLedger::with_demo_user().await))
}

#[cfg(not(feature = "postgres"))]
async fn build_ledger(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but the postgres feature is off — using in-memory ledger");
    }
    Ok(Arc::new(InMemoryLedger::with_demo_user().await))
}
