//! # portfolio::valuer
//!
//! **PortfolioValuer** — marks a user's holdings to the latest prices,
//! appends the result to the ledger and builds the chart series.
//!
//! ```text
//! value_and_record(user, prices)
//!   │
//!   ├─ total = Σ quantity × price   (missing price → 0, logged)
//!   ├─ no valuation yet? → 15 back-dated points over the last 7 days
//!   └─ record (user, total, now)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::models::{HistoryKind, HistoryPoint, Timeframe, TradeMarker};
use crate::portfolio::{LedgerError, LedgerStore};

/// Synthetic points written on a user's first valuation.
const SEED_POINTS: i64 = 15;
/// Span covered by the synthetic points.
const SEED_SPAN_DAYS: i64 = 7;
/// Max relative deviation of a synthetic point from the real value.
const SEED_NOISE: f64 = 0.01;

pub struct PortfolioValuer {
    ledger: Arc<dyn LedgerStore>,
}

impl PortfolioValuer {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    /// Σ quantity × price over the user's holdings.
    pub async fn total_value(
        &self,
        user_id: &str,
        prices:  &HashMap<String, f64>,
    ) -> Result<f64, LedgerError> {
        let holdings = self.ledger.get_holdings(user_id).await?;

        let mut total = 0.0;
        for holding in &holdings {
            match prices.get(&holding.symbol) {
                Some(price) => total += holding.quantity * price,
                None => warn!(
                    user_id,
                    symbol = %holding.symbol,
                    "No current price for holding — valued at 0"
                ),
            }
        }
        Ok(total)
    }

    /// Value the portfolio now and append it to the valuation history.
    pub async fn value_and_record(
        &self,
        user_id: &str,
        prices:  &HashMap<String, f64>,
    ) -> Result<f64, LedgerError> {
        let total = self.total_value(user_id, prices).await?;
        let now = Utc::now();

        if !self.ledger.has_valuations(user_id).await? {
            let seeds = seed_points(total, now);
            for (timestamp, value) in &seeds {
                self.ledger.record_valuation(user_id, *value, *timestamp).await?;
            }
            info!(user_id, points = seeds.len(), "🌱 Seeded valuation history");
        }

        self.ledger.record_valuation(user_id, total, now).await?;
        debug!(user_id, total, "Portfolio valued");
        Ok(total)
    }

    /// Valuations and trades inside `timeframe`, merged chronologically.
    ///
    /// A trade point carries the last valuation at or before it, or 0.
    pub async fn history(
        &self,
        user_id:   &str,
        timeframe: Timeframe,
    ) -> Result<Vec<HistoryPoint>, LedgerError> {
        let since = timeframe.since(Utc::now());
        let valuations = self.ledger.get_valuation_history(user_id, since).await?;
        let trades = self.ledger.get_trades(user_id, since).await?;

        // ── 1. Tag both streams ───────────────────────────────────────────────
        let mut merged: Vec<(DateTime<Utc>, Option<f64>, Option<TradeMarker>)> =
            Vec::with_capacity(valuations.len() + trades.len());
        merged.extend(valuations.into_iter().map(|v| (v.timestamp, Some(v.total_value), None)));
        merged.extend(trades.into_iter().map(|t| {
            let marker = TradeMarker {
                symbol:   t.symbol,
                side:     t.side,
                quantity: t.quantity,
                price:    t.price,
            };
            (t.timestamp, None, Some(marker))
        }));

        // ── 2. Order (stable: valuations win ties) ────────────────────────────
        merged.sort_by_key(|(timestamp, _, _)| *timestamp);

        // ── 3. Assign values and positional ids ───────────────────────────────
        let mut last_value = 0.0;
        let points = merged
            .into_iter()
            .enumerate()
            .map(|(id, (timestamp, value, trade))| match value {
                Some(value) => {
                    last_value = value;
                    HistoryPoint { id, timestamp, value, kind: HistoryKind::Valuation, trade: None }
                }
                None => HistoryPoint { id, timestamp, value: last_value, kind: HistoryKind::Trade, trade },
            })
            .collect();

        Ok(points)
    }
}

/// 15 points evenly spread from 7 days ago towards `now`, each within ±1% of `total`.
fn seed_points(total: f64, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, f64)> {
    let mut rng = rand::thread_rng();
    let start = now - Duration::days(SEED_SPAN_DAYS);
    let step = Duration::days(SEED_SPAN_DAYS) / SEED_POINTS as i32;

    (0..SEED_POINTS)
        .map(|i| {
            let noise = rng.gen_range(-SEED_NOISE..=SEED_NOISE);
            (start + step * i as i32, total * (1.0 + noise))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Holding, PortfolioValuation, TradeEvent, TradeSide};
    use crate::portfolio::InMemoryLedger;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Forwards to an [`InMemoryLedger`], counting valuation rows handed out.
    struct CountingLedger {
        inner:         InMemoryLedger,
        rows_returned: AtomicUsize,
    }

    #[async_trait]
    impl LedgerStore for CountingLedger {
        async fn list_users(&self) -> Result<Vec<String>, LedgerError> {
            self.inner.list_users().await
        }

        async fn get_holdings(&self, user_id: &str) -> Result<Vec<Holding>, LedgerError> {
            self.inner.get_holdings(user_id).await
        }

        async fn record_valuation(
            &self,
            user_id:     &str,
            total_value: f64,
            timestamp:   DateTime<Utc>,
        ) -> Result<(), LedgerError> {
            self.inner.record_valuation(user_id, total_value, timestamp).await
        }

        async fn has_valuations(&self, user_id: &str) -> Result<bool, LedgerError> {
            self.inner.has_valuations(user_id).await
        }

        async fn get_valuation_history(
            &self,
            user_id: &str,
            since:   Option<DateTime<Utc>>,
        ) -> Result<Vec<PortfolioValuation>, LedgerError> {
            let rows = self.inner.get_valuation_history(user_id, since).await?;
            self.rows_returned.fetch_add(rows.len(), Ordering::Relaxed);
            Ok(rows)
        }

        async fn get_trades(
            &self,
            user_id: &str,
            since:   Option<DateTime<Utc>>,
        ) -> Result<Vec<TradeEvent>, LedgerError> {
            self.inner.get_trades(user_id, since).await
        }
    }

    fn prices(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    async fn valuer_with(holdings: &[(&str, f64)]) -> (PortfolioValuer, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new());
        for (symbol, quantity) in holdings {
            ledger.set_holding("alice", symbol, *quantity, 0.0).await;
        }
        (PortfolioValuer::new(ledger.clone()), ledger)
    }

    #[tokio::test]
    async fn half_a_bitcoin_is_worth_half_the_price() {
        let (valuer, _) = valuer_with(&[("BTC", 0.5)]).await;
        let total = valuer.total_value("alice", &prices(&[("BTC", 95_000.0)])).await.unwrap();
        assert_eq!(total, 47_500.0);
    }

    #[tokio::test]
    async fn missing_price_counts_as_zero() {
        let (valuer, _) = valuer_with(&[("BTC", 0.5), ("DOGE", 1_000.0)]).await;
        let total = valuer.total_value("alice", &prices(&[("BTC", 95_000.0)])).await.unwrap();
        assert_eq!(total, 47_500.0);
    }

    #[tokio::test]
    async fn first_valuation_seeds_history_once() {
        let (valuer, ledger) = valuer_with(&[("ETH", 2.0)]).await;
        let p = prices(&[("ETH", 3_500.0)]);

        valuer.value_and_record("alice", &p).await.unwrap();
        let history = ledger.get_valuation_history("alice", None).await.unwrap();
        assert_eq!(history.len(), 16);

        let now = Utc::now();
        for seed in &history[..15] {
            assert!(seed.timestamp >= now - Duration::days(7) - Duration::seconds(5));
            assert!(seed.timestamp < now);
            assert!((seed.total_value - 7_000.0).abs() <= 70.0 + 1e-9);
        }
        assert_eq!(history[15].total_value, 7_000.0);

        valuer.value_and_record("alice", &p).await.unwrap();
        assert_eq!(ledger.get_valuation_history("alice", None).await.unwrap().len(), 17);
    }

    #[tokio::test]
    async fn recording_does_not_read_back_valuation_history() {
        let inner = InMemoryLedger::new();
        inner.set_holding("alice", "BTC", 1.0, 0.0).await;
        let ledger = Arc::new(CountingLedger { inner, rows_returned: AtomicUsize::new(0) });
        let valuer = PortfolioValuer::new(ledger.clone());
        let p = prices(&[("BTC", 95_000.0)]);

        for _ in 0..500 {
            valuer.value_and_record("alice", &p).await.unwrap();
        }

        assert_eq!(ledger.rows_returned.load(Ordering::Relaxed), 0);
        assert!(ledger.has_valuations("alice").await.unwrap());
        assert_eq!(ledger.inner.get_valuation_history("alice", None).await.unwrap().len(), 515);
    }

    #[tokio::test]
    async fn history_interleaves_trades_with_last_value() {
        let (valuer, ledger) = valuer_with(&[("BTC", 1.0)]).await;
        let now = Utc::now();

        ledger.push_trade(TradeEvent {
            user_id:   "alice".into(),
            symbol:    "BTC".into(),
            side:      TradeSide::Buy,
            quantity:  1.0,
            price:     90_000.0,
            timestamp: now - Duration::hours(5),
        }).await;
        ledger.record_valuation("alice", 100.0, now - Duration::hours(4)).await.unwrap();
        ledger.push_trade(TradeEvent {
            user_id:   "alice".into(),
            symbol:    "BTC".into(),
            side:      TradeSide::Sell,
            quantity:  0.5,
            price:     91_000.0,
            timestamp: now - Duration::hours(3),
        }).await;
        ledger.record_valuation("alice", 120.0, now - Duration::hours(2)).await.unwrap();

        let points = valuer.history("alice", Timeframe::Day).await.unwrap();
        let shape: Vec<(usize, HistoryKind, f64)> = points.iter().map(|p| (p.id, p.kind, p.value)).collect();
        assert_eq!(
            shape,
            vec![
                (0, HistoryKind::Trade, 0.0),
                (1, HistoryKind::Valuation, 100.0),
                (2, HistoryKind::Trade, 100.0),
                (3, HistoryKind::Valuation, 120.0),
            ]
        );
        assert_eq!(points[2].trade.as_ref().unwrap().side, TradeSide::Sell);
    }

    #[tokio::test]
    async fn timeframe_limits_history() {
        let (valuer, ledger) = valuer_with(&[("BTC", 1.0)]).await;
        let now = Utc::now();
        ledger.record_valuation("alice", 1.0, now - Duration::days(40)).await.unwrap();
        ledger.record_valuation("alice", 2.0, now - Duration::days(3)).await.unwrap();

        assert_eq!(valuer.history("alice", Timeframe::Week).await.unwrap().len(), 1);
        assert_eq!(valuer.history("alice", Timeframe::All).await.unwrap().len(), 2);
    }
}
