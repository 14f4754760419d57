//! # portfolio::db — PostgreSQL Ledger Store
//!
//! Built with `--features postgres`; used when `DATABASE_URL` is set.
//!
//! ## Setup
//! 1. Create a database and set `DATABASE_URL` in `.env`
//! 2. Start the server; `migrations/001_init.sql` is applied on connect

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use tracing::info;

use crate::models::{Holding, PortfolioValuation, TradeEvent, TradeSide};
use crate::portfolio::{LedgerError, LedgerStore};

const MIGRATION: &str = include_str!("../../migrations/001_init.sql");

// ─── Pool Init ────────────────────────────────────────────────────────────────

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    pool.execute(MIGRATION)
        .await
        .context("Failed to run migration 001_init.sql")?;

    info!("✅ PostgreSQL connected and migrations applied");
    Ok(pool)
}

// ─── Store ────────────────────────────────────────────────────────────────────

pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct HoldingRow {
    user_id:      String,
    symbol:       String,
    quantity:     f64,
    average_cost: f64,
}

#[derive(sqlx::FromRow)]
struct ValuationRow {
    user_id:     String,
    total_value: f64,
    valued_at:   DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct TradeRow {
    user_id:     String,
    symbol:      String,
    side:        String,
    quantity:    f64,
    price:       f64,
    executed_at: DateTime<Utc>,
}

impl TryFrom<TradeRow> for TradeEvent {
    type Error = LedgerError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        let side = match row.side.as_str() {
            "buy"  => TradeSide::Buy,
            "sell" => TradeSide::Sell,
            other  => return Err(LedgerError::Query(format!("unknown trade side '{other}'"))),
        };
        Ok(TradeEvent {
            user_id:   row.user_id,
            symbol:    row.symbol,
            side,
            quantity:  row.quantity,
            price:     row.price,
            timestamp: row.executed_at,
        })
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn list_users(&self) -> Result<Vec<String>, LedgerError> {
        let users: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT user_id FROM holdings WHERE quantity <> 0 ORDER BY user_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users.into_iter().map(|(u,)| u).collect())
    }

    async fn get_holdings(&self, user_id: &str) -> Result<Vec<Holding>, LedgerError> {
        let rows: Vec<HoldingRow> = sqlx::query_as(
            "SELECT user_id, symbol, quantity, average_cost FROM holdings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Holding {
                user_id:      r.user_id,
                symbol:       r.symbol,
                quantity:     r.quantity,
                average_cost: r.average_cost,
            })
            .collect())
    }

    async fn record_valuation(
        &self,
        user_id:     &str,
        total_value: f64,
        timestamp:   DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        sqlx::query("INSERT INTO portfolio_valuations (user_id, total_value, valued_at) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(total_value)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn has_valuations(&self, user_id: &str) -> Result<bool, LedgerError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM portfolio_valuations WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn get_valuation_history(
        &self,
        user_id: &str,
        since:   Option<DateTime<Utc>>,
    ) -> Result<Vec<PortfolioValuation>, LedgerError> {
        let rows: Vec<ValuationRow> = sqlx::query_as(
            r#"
            SELECT user_id, total_value, valued_at
            FROM portfolio_valuations
            WHERE user_id = $1 AND ($2::timestamptz IS NULL OR valued_at >= $2)
            ORDER BY valued_at, id
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| PortfolioValuation {
                user_id:     r.user_id,
                total_value: r.total_value,
                timestamp:   r.valued_at,
            })
            .collect())
    }

    async fn get_trades(
        &self,
        user_id: &str,
        since:   Option<DateTime<Utc>>,
    ) -> Result<Vec<TradeEvent>, LedgerError> {
        let rows: Vec<TradeRow> = sqlx::query_as(
            r#"
            SELECT user_id, symbol, side, quantity, price, executed_at
            FROM trades
            WHERE user_id = $1 AND ($2::timestamptz IS NULL OR executed_at >= $2)
            ORDER BY executed_at, id
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TradeEvent::try_from).collect()
    }
}
