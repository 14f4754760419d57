//! # portfolio::ledger
//!
//! [`LedgerStore`] is the persistence seam for holdings, trades and valuation
//! samples. The analytics core only reads holdings/trades and appends
//! valuations; everything else about the ledger is owned elsewhere.
//!
//! [`InMemoryLedger`] is the default store. Started with
//! [`InMemoryLedger::with_demo_user`] it carries one seeded account so the
//! portfolio loop has work in development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{Holding, PortfolioValuation, TradeEvent, TradeSide};

pub const DEMO_USER: &str = "demo";

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Only database-backed stores fail; the in-memory store never does.
#[derive(Debug, Error)]
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
pub enum LedgerError {
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),

    #[error("ledger query failed: {0}")]
    Query(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                LedgerError::Unavailable(err.to_string())
            }
            other => LedgerError::Query(other.to_string()),
        }
    }
}

// ─── Trait ────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Users that currently hold anything.
    async fn list_users(&self) -> Result<Vec<String>, LedgerError>;

    async fn get_holdings(&self, user_id: &str) -> Result<Vec<Holding>, LedgerError>;

    async fn record_valuation(
        &self,
        user_id:     &str,
        total_value: f64,
        timestamp:   DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    /// Whether any valuation has ever been recorded for `user_id`.
    async fn has_valuations(&self, user_id: &str) -> Result<bool, LedgerError>;

    /// Valuations at or after `since` (all when `None`), oldest first.
    async fn get_valuation_history(
        &self,
        user_id: &str,
        since:   Option<DateTime<Utc>>,
    ) -> Result<Vec<PortfolioValuation>, LedgerError>;

    /// Trades at or after `since` (all when `None`), oldest first.
    async fn get_trades(
        &self,
        user_id: &str,
        since:   Option<DateTime<Utc>>,
    ) -> Result<Vec<TradeEvent>, LedgerError>;
}

// ─── In-Memory Store ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Account {
    holdings:   Vec<Holding>,
    trades:     Vec<TradeEvent>,
    valuations: Vec<PortfolioValuation>,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger holding 0.5 BTC, 2 ETH and 25 SOL for [`DEMO_USER`], with the
    /// trades that opened those positions.
    pub async fn with_demo_user() -> Self {
        let ledger = Self::new();
        let opened = Utc::now() - Duration::days(3);

        for (symbol, quantity, price) in [("BTC", 0.5, 92_000.0), ("ETH", 2.0, 3_400.0), ("SOL", 25.0, 170.0)] {
            ledger.set_holding(DEMO_USER, symbol, quantity, price).await;
            ledger
                .push_trade(TradeEvent {
                    user_id:   DEMO_USER.to_string(),
                    symbol:    symbol.to_string(),
                    side:      TradeSide::Buy,
                    quantity,
                    price,
                    timestamp: opened,
                })
                .await;
        }
        ledger
    }

    /// Insert or replace a position.
    pub async fn set_holding(&self, user_id: &str, symbol: &str, quantity: f64, average_cost: f64) {
        let mut accounts = self.accounts.write().await;
        let account = accounts.entry(user_id.to_string()).or_default();
        account.holdings.retain(|h| h.symbol != symbol);
        account.holdings.push(Holding {
            user_id:      user_id.to_string(),
            symbol:       symbol.to_string(),
            quantity,
            average_cost,
        });
    }

    pub async fn push_trade(&self, trade: TradeEvent) {
        let mut accounts = self.accounts.write().await;
        accounts.entry(trade.user_id.clone()).or_default().trades.push(trade);
    }
}

fn since_filter<'a, T: 'a>(
    items:     &'a [T],
    since:     Option<DateTime<Utc>>,
    timestamp: impl Fn(&T) -> DateTime<Utc> + 'a,
) -> impl Iterator<Item = &'a T> + 'a {
    items.iter().filter(move |item| since.map_or(true, |s| timestamp(item) >= s))
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn list_users(&self) -> Result<Vec<String>, LedgerError> {
        let accounts = self.accounts.read().await;
        let mut users: Vec<String> = accounts
            .iter()
            .filter(|(_, a)| !a.holdings.is_empty())
            .map(|(user, _)| user.clone())
            .collect();
        users.sort();
        Ok(users)
    }

    async fn get_holdings(&self, user_id: &str) -> Result<Vec<Holding>, LedgerError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(user_id).map(|a| a.holdings.clone()).unwrap_or_default())
    }

    async fn record_valuation(
        &self,
        user_id:     &str,
        total_value: f64,
        timestamp:   DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut accounts = self.accounts.write().await;
        let valuations = &mut accounts.entry(user_id.to_string()).or_default().valuations;
        valuations.push(PortfolioValuation { user_id: user_id.to_string(), total_value, timestamp });
        // seed points are back-dated
        valuations.sort_by_key(|v| v.timestamp);
        Ok(())
    }

    async fn has_valuations(&self, user_id: &str) -> Result<bool, LedgerError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(user_id).is_some_and(|a| !a.valuations.is_empty()))
    }

    async fn get_valuation_history(
        &self,
        user_id: &str,
        since:   Option<DateTime<Utc>>,
    ) -> Result<Vec<PortfolioValuation>, LedgerError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .get(user_id)
            .map(|a| since_filter(&a.valuations, since, |v| v.timestamp).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_trades(
        &self,
        user_id: &str,
        since:   Option<DateTime<Utc>>,
    ) -> Result<Vec<TradeEvent>, LedgerError> {
        let accounts = self.accounts.read().await;
        let mut trades: Vec<TradeEvent> = accounts
            .get(user_id)
            .map(|a| since_filter(&a.trades, since, |t| t.timestamp).cloned().collect())
            .unwrap_or_default();
        trades.sort_by_key(|t| t.timestamp);
        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_user_is_listed_with_holdings() {
        let ledger = InMemoryLedger::with_demo_user().await;
        assert_eq!(ledger.list_users().await.unwrap(), vec![DEMO_USER.to_string()]);

        let holdings = ledger.get_holdings(DEMO_USER).await.unwrap();
        assert_eq!(holdings.len(), 3);
        assert_eq!(ledger.get_trades(DEMO_USER, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn set_holding_replaces_position() {
        let ledger = InMemoryLedger::new();
        ledger.set_holding("alice", "BTC", 1.0, 90_000.0).await;
        ledger.set_holding("alice", "BTC", 0.25, 91_000.0).await;

        let holdings = ledger.get_holdings("alice").await.unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].quantity, 0.25);
    }

    #[tokio::test]
    async fn valuations_are_filtered_and_ordered() {
        let ledger = InMemoryLedger::new();
        let now = Utc::now();
        ledger.record_valuation("bob", 2.0, now).await.unwrap();
        ledger.record_valuation("bob", 1.0, now - Duration::days(2)).await.unwrap();
        ledger.record_valuation("bob", 0.5, now - Duration::days(10)).await.unwrap();

        let all = ledger.get_valuation_history("bob", None).await.unwrap();
        let values: Vec<f64> = all.iter().map(|v| v.total_value).collect();
        assert_eq!(values, vec![0.5, 1.0, 2.0]);

        let week = ledger
            .get_valuation_history("bob", Some(now - Duration::days(7)))
            .await
            .unwrap();
        assert_eq!(week.len(), 2);
    }

    #[tokio::test]
    async fn unknown_user_reads_empty() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.get_holdings("nobody").await.unwrap().is_empty());
        assert!(ledger.get_valuation_history("nobody", None).await.unwrap().is_empty());
        assert!(ledger.list_users().await.unwrap().is_empty());
        assert!(!ledger.has_valuations("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn has_valuations_after_first_record() {
        let ledger = InMemoryLedger::with_demo_user().await;
        assert!(!ledger.has_valuations(DEMO_USER).await.unwrap());

        ledger.record_valuation(DEMO_USER, 59_000.0, Utc::now()).await.unwrap();
        assert!(ledger.has_valuations(DEMO_USER).await.unwrap());
    }
}
