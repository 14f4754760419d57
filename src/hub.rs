//! # hub
//!
//! **BroadcastHub** — fans market snapshots out to WebSocket subscribers.
//!
//! ```text
//!  publish(snapshot) ──▶ serialize once ──▶ latest[symbol] = (snapshot, payload)
//!                                      └──▶ send_timeout(payload) to every subscriber
//!                                             failed / timed out → subscriber removed
//!
//!  subscribe() ──▶ bounded mpsc, pre-filled with latest[*] payloads verbatim
//! ```
//!
//! Each subscriber has its own bounded queue, so one slow socket can only
//! ever cost a publish its send timeout; it never backs up the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::BroadcastConfig;
use crate::events::MarketMessage;
use crate::models::MarketSnapshot;

#[derive(Debug, Error)]
#[error("snapshot for {symbol} at {timestamp} is older than the last one published ({latest})")]
pub struct StaleSnapshot {
    pub symbol:    String,
    pub timestamp: DateTime<Utc>,
    pub latest:    DateTime<Utc>,
}

/// Receiving half handed to a WebSocket task.
pub struct Subscription {
    pub id: Uuid,
    pub rx: mpsc::Receiver<Arc<str>>,
}

struct Latest {
    snapshot: MarketSnapshot,
    payload:  Arc<str>,
}

pub struct BroadcastHub {
    subscribers:  RwLock<HashMap<Uuid, mpsc::Sender<Arc<str>>>>,
    latest:       DashMap<String, Latest>,
    send_timeout: Duration,
    buffer:       usize,
}

impl BroadcastHub {
    pub fn new(send_timeout: Duration, buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            latest:      DashMap::new(),
            send_timeout,
            buffer:      buffer.max(1),
        }
    }

    pub fn from_config(config: &BroadcastConfig) -> Self {
        Self::new(config.send_timeout, config.subscriber_buffer)
    }

    /// Record `snapshot` as the latest for its symbol and deliver it.
    ///
    /// Returns how many subscribers accepted the message.
    pub async fn publish(&self, snapshot: MarketSnapshot) -> Result<usize, StaleSnapshot> {
        let payload: Arc<str> = MarketMessage::from(&snapshot).to_json().into();

        // ── 1. Latest per symbol (timestamps never go backwards) ──────────────
        match self.latest.entry(snapshot.symbol.clone()) {
            Entry::Occupied(mut slot) => {
                let latest = slot.get().snapshot.timestamp;
                if snapshot.timestamp < latest {
                    return Err(StaleSnapshot {
                        symbol:    snapshot.symbol,
                        timestamp: snapshot.timestamp,
                        latest,
                    });
                }
                slot.insert(Latest { snapshot, payload: Arc::clone(&payload) });
            }
            Entry::Vacant(slot) => {
                slot.insert(Latest { snapshot, payload: Arc::clone(&payload) });
            }
        }

        // ── 2. Fan out ────────────────────────────────────────────────────────
        let targets: Vec<(Uuid, mpsc::Sender<Arc<str>>)> = {
            let subscribers = self.subscribers.read().await;
            subscribers.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };
        if targets.is_empty() {
            return Ok(0);
        }

        let timeout = self.send_timeout;
        let results = join_all(targets.into_iter().map(|(id, tx)| {
            let payload = Arc::clone(&payload);
            async move { (id, tx.send_timeout(payload, timeout).await.is_ok()) }
        }))
        .await;

        // ── 3. Drop closed / stalled subscribers ──────────────────────────────
        let dead: Vec<Uuid> = results.iter().filter(|(_, ok)| !ok).map(|(id, _)| *id).collect();
        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in &dead {
                subscribers.remove(id);
            }
            debug!(removed = dead.len(), remaining = subscribers.len(), "Dropped unresponsive subscribers");
        }

        Ok(results.len() - dead.len())
    }

    /// Register a subscriber; its queue already holds the last message of
    /// every symbol.
    pub async fn subscribe(&self) -> Subscription {
        // Held while pre-filling so no publish can slip between the catch-up
        // and the registration.
        let mut subscribers = self.subscribers.write().await;

        let mut catch_up: Vec<(String, Arc<str>)> = self
            .latest
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(&e.value().payload)))
            .collect();
        catch_up.sort_by(|a, b| a.0.cmp(&b.0));

        let (tx, rx) = mpsc::channel(self.buffer.max(catch_up.len()));
        for (_, payload) in catch_up {
            // capacity covers every symbol
            let _ = tx.try_send(payload);
        }

        let id = Uuid::new_v4();
        subscribers.insert(id, tx);
        info!(%id, subscribers = subscribers.len(), "🔌 Subscriber joined");
        Subscription { id, rx }
    }

    pub async fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = self.subscribers.write().await.remove(&id).is_some();
        if removed {
            info!(%id, "🔌 Subscriber left");
        }
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Latest published snapshot per symbol, ordered by symbol.
    pub fn latest_snapshots(&self) -> Vec<MarketSnapshot> {
        let mut snapshots: Vec<MarketSnapshot> =
            self.latest.iter().map(|e| e.value().snapshot.clone()).collect();
        snapshots.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PriceTick, Quote};
    use chrono::TimeZone;

    fn snapshot(symbol: &str, price: f64, second: i64) -> MarketSnapshot {
        let ts = Utc.timestamp_opt(1_760_000_000 + second, 0).unwrap();
        let tick = PriceTick::new(symbol, Quote { price, volume_24h: 10.0 }, ts);
        MarketSnapshot::from_tick(&tick, "binance")
    }

    fn wire(snapshot: &MarketSnapshot) -> String {
        MarketMessage::from(snapshot).to_json()
    }

    fn hub() -> BroadcastHub {
        BroadcastHub::new(Duration::from_millis(100), 8)
    }

    #[tokio::test]
    async fn late_subscriber_receives_latest_per_symbol_verbatim() {
        let hub = hub();
        let btc_old = snapshot("BTC", 95_000.0, 0);
        let btc_new = snapshot("BTC", 95_100.0, 1);
        let eth = snapshot("ETH", 3_500.0, 1);
        hub.publish(btc_old).await.unwrap();
        hub.publish(btc_new.clone()).await.unwrap();
        hub.publish(eth.clone()).await.unwrap();

        let mut sub = hub.subscribe().await;
        assert_eq!(&*sub.rx.recv().await.unwrap(), wire(&btc_new));
        assert_eq!(&*sub.rx.recv().await.unwrap(), wire(&eth));
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let hub = hub();
        let mut a = hub.subscribe().await;
        let mut b = hub.subscribe().await;

        let snap = snapshot("SOL", 180.0, 0);
        assert_eq!(hub.publish(snap.clone()).await.unwrap(), 2);

        assert_eq!(&*a.rx.recv().await.unwrap(), wire(&snap));
        assert_eq!(&*b.rx.recv().await.unwrap(), wire(&snap));
    }

    #[tokio::test]
    async fn older_snapshot_is_rejected() {
        let hub = hub();
        hub.publish(snapshot("BTC", 1.0, 5)).await.unwrap();

        let err = hub.publish(snapshot("BTC", 2.0, 4)).await.unwrap_err();
        assert_eq!(err.symbol, "BTC");
        assert_eq!(hub.latest_snapshots()[0].price, 1.0);

        // equal timestamps are accepted
        hub.publish(snapshot("BTC", 3.0, 5)).await.unwrap();
        assert_eq!(hub.latest_snapshots()[0].price, 3.0);
    }

    #[tokio::test]
    async fn closed_subscriber_is_removed() {
        let hub = hub();
        let sub = hub.subscribe().await;
        let _live = hub.subscribe().await;
        drop(sub);

        assert_eq!(hub.publish(snapshot("BTC", 1.0, 0)).await.unwrap(), 1);
        assert_eq!(hub.subscriber_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_subscriber_is_removed_after_send_timeout() {
        let hub = BroadcastHub::new(Duration::from_millis(100), 1);
        let mut slow = hub.subscribe().await;

        assert_eq!(hub.publish(snapshot("BTC", 1.0, 0)).await.unwrap(), 1);
        // queue full, nobody reading
        assert_eq!(hub.publish(snapshot("BTC", 2.0, 1)).await.unwrap(), 0);
        assert_eq!(hub.subscriber_count().await, 0);

        assert!(slow.rx.recv().await.is_some());
        assert!(slow.rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let hub = hub();
        let sub = hub.subscribe().await;
        assert!(hub.unsubscribe(sub.id).await);
        assert!(!hub.unsubscribe(sub.id).await);
        assert_eq!(hub.subscriber_count().await, 0);
    }
}
