//! # oracle::cache
//!
//! **RecommendationCache** — per-symbol TTL cache with single-flight refresh.
//!
//! ```text
//! get(symbol)
//!   │
//!   ├─ fresh entry (age < TTL) ───────────────▶ return it, no oracle call
//!   │
//!   ├─ refresh already in flight ─────────────▶ await the shared result
//!   │
//!   └─ otherwise spawn ONE refresh task ──────▶ oracle.advise() under timeout
//!                                                 ok    → cache result
//!                                                 error → cache fallback
//! ```
//!
//! The refresh runs in its own task, so a caller that stops waiting (see
//! [`RecommendationCache::get_within`]) never cancels it; the result still
//! lands in the cache for the next tick. A failing oracle is asked at most
//! once per TTL per symbol because the fallback is cached like any answer.
//!
//! Each symbol has its own slot behind its own mutex; no lock is shared
//! between symbols and none is held across an `.await`.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::models::Recommendation;
use crate::oracle::{AdvisoryContext, AdvisoryOracle};

type Flight = Shared<BoxFuture<'static, Recommendation>>;

struct CachedEntry {
    recommendation: Recommendation,
    stored_at:      Instant,
}

#[derive(Default)]
struct Slot {
    cached:    Option<CachedEntry>,
    in_flight: Option<Flight>,
}

enum Lookup {
    Fresh(Recommendation),
    Pending(Flight),
}

pub struct RecommendationCache {
    oracle:         Arc<dyn AdvisoryOracle>,
    ttl:            Duration,
    oracle_timeout: Duration,
    slots:          DashMap<String, Arc<Mutex<Slot>>>,
    oracle_calls:   Arc<AtomicU64>,
}

impl RecommendationCache {
    pub fn new(oracle: Arc<dyn AdvisoryOracle>, ttl: Duration, oracle_timeout: Duration) -> Self {
        Self {
            oracle,
            ttl,
            oracle_timeout,
            slots:        DashMap::new(),
            oracle_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fresh cached value, or the result of the (single) refresh for `symbol`.
    pub async fn get(&self, symbol: &str, context: &AdvisoryContext) -> Recommendation {
        match self.lookup(symbol, context) {
            Lookup::Fresh(rec)       => rec,
            Lookup::Pending(flight) => flight.await,
        }
    }

    /// Like [`get`](Self::get) but waits at most `budget` for a refresh.
    ///
    /// When the refresh is not ready in time the previous value (even if
    /// stale) is returned, or `None` if the symbol was never answered. The
    /// refresh keeps running and fills the cache when done.
    pub async fn get_within(
        &self,
        symbol:  &str,
        context: &AdvisoryContext,
        budget:  Duration,
    ) -> Option<Recommendation> {
        match self.lookup(symbol, context) {
            Lookup::Fresh(rec) => Some(rec),
            Lookup::Pending(flight) => match tokio::time::timeout(budget, flight).await {
                Ok(rec) => Some(rec),
                Err(_) => {
                    debug!(symbol, ?budget, "Recommendation not ready — using previous value");
                    self.cached(symbol)
                }
            },
        }
    }

    /// Last stored value regardless of age.
    pub fn cached(&self, symbol: &str) -> Option<Recommendation> {
        let slot = self.slots.get(symbol).map(|s| Arc::clone(s.value()))?;
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.cached.as_ref().map(|e| e.recommendation.clone())
    }

    /// Total oracle invocations since start.
    pub fn oracle_calls(&self) -> u64 {
        self.oracle_calls.load(Ordering::Relaxed)
    }

    // ─── Internals ────────────────────────────────────────────────────────────

    fn slot(&self, symbol: &str) -> Arc<Mutex<Slot>> {
        Arc::clone(self.slots.entry(symbol.to_string()).or_default().value())
    }

    fn lookup(&self, symbol: &str, context: &AdvisoryContext) -> Lookup {
        let slot = self.slot(symbol);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = &guard.cached {
            if entry.stored_at.elapsed() < self.ttl {
                return Lookup::Fresh(entry.recommendation.clone());
            }
        }

        if let Some(flight) = &guard.in_flight {
            return Lookup::Pending(flight.clone());
        }

        // Registered while still holding the slot lock, so a second caller
        // can only ever see this flight.
        let flight = self.spawn_refresh(symbol, context, Arc::clone(&slot));
        guard.in_flight = Some(flight.clone());
        Lookup::Pending(flight)
    }

    fn spawn_refresh(&self, symbol: &str, context: &AdvisoryContext, slot: Arc<Mutex<Slot>>) -> Flight {
        let oracle  = Arc::clone(&self.oracle);
        let calls   = Arc::clone(&self.oracle_calls);
        let timeout = self.oracle_timeout;
        let symbol  = symbol.to_string();
        let context = context.clone();

        let task = tokio::spawn(async move {
            calls.fetch_add(1, Ordering::Relaxed);
            let call = AssertUnwindSafe(oracle.advise(&symbol, &context)).catch_unwind();

            let recommendation = match tokio::time::timeout(timeout, call).await {
                Ok(Ok(Ok(rec))) => {
                    debug!(symbol = %symbol, oracle = oracle.name(), action = ?rec.action, "Recommendation refreshed");
                    rec
                }
                Ok(Ok(Err(e))) => {
                    warn!(symbol = %symbol, oracle = oracle.name(), error = %e, "Oracle failed — caching fallback");
                    Recommendation::fallback()
                }
                Ok(Err(_)) => {
                    error!(symbol = %symbol, oracle = oracle.name(), "Oracle panicked — caching fallback");
                    Recommendation::fallback()
                }
                Err(_) => {
                    warn!(symbol = %symbol, oracle = oracle.name(), ?timeout, "Oracle timed out — caching fallback");
                    Recommendation::fallback()
                }
            };

            let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            guard.cached = Some(CachedEntry {
                recommendation: recommendation.clone(),
                stored_at:      Instant::now(),
            });
            guard.in_flight = None;
            recommendation
        });

        async move {
            task.await.unwrap_or_else(|e| {
                error!(error = %e, "Recommendation refresh task aborted");
                Recommendation::fallback()
            })
        }
        .boxed()
        .shared()
    }
}
