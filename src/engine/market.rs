//! # engine::market
//!
//! **MarketEngine** — everything one market tick touches, in one place.
//!
//! ```text
//!  tick_all()
//!    ├─ spawn process_symbol("BTC") ─┐
//!    ├─ spawn process_symbol("ETH") ─┼─ join_all → count ok / faults
//!    └─ spawn process_symbol("SOL") ─┘
//!
//!  process_symbol(s)
//!    1. quote  ← price_source.next_quote(last quote)
//!    2. history.append → snapshot
//!    3. patterns / volatility (once the window is full)
//!    4. recommendation ← cache.get_within(wait budget)
//!    5. hub.publish(MarketSnapshot)
//! ```
//!
//! Symbols run in separate tasks: an error or a panic in one is logged and
//! costs only that symbol's update for this tick.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::engine::{PatternDetector, PriceHistoryBuffer, PriceSource, VolatilityEngine};
use crate::error::AppError;
use crate::hub::BroadcastHub;
use crate::models::{MarketSnapshot, PriceTick, Quote, Recommendation};
use crate::oracle::cache::RecommendationCache;
use crate::oracle::{AdvisoryContext, AdvisoryOracle};

// ─── Stats ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Counters {
    ticks:     AtomicU64,
    snapshots: AtomicU64,
    faults:    AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub ticks:        u64,
    pub snapshots:    u64,
    pub faults:       u64,
    pub oracle_calls: u64,
}

/// Fill level of one symbol's price buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStat {
    pub symbol: String,
    pub count:  usize,
    pub latest: Option<f64>,
}

/// Outcome of one [`MarketEngine::tick_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub published: usize,
    pub faults:    usize,
}

// ─── Engine ───────────────────────────────────────────────────────────────────

pub struct MarketEngine {
    exchange:     String,
    symbols:      Vec<String>,
    window:       usize,
    wait_budget:  Duration,
    history:      PriceHistoryBuffer,
    quotes:       DashMap<String, Quote>,
    detector:     PatternDetector,
    volatility:   VolatilityEngine,
    cache:        RecommendationCache,
    hub:          Arc<BroadcastHub>,
    price_source: Arc<dyn PriceSource>,
    counters:     Counters,
}

impl MarketEngine {
    pub fn new(
        config:       &Config,
        oracle:       Arc<dyn AdvisoryOracle>,
        price_source: Arc<dyn PriceSource>,
        hub:          Arc<BroadcastHub>,
    ) -> Self {
        let quotes = DashMap::new();
        for seed in &config.symbols {
            quotes.insert(seed.symbol.clone(), Quote { price: seed.price, volume_24h: seed.volume_24h });
        }

        Self {
            exchange:    config.exchange.clone(),
            symbols:     config.symbol_names(),
            window:      config.analytics.window,
            wait_budget: config.advisory.wait_budget,
            history:     PriceHistoryBuffer::new(config.history_capacity),
            quotes,
            detector:    PatternDetector::from_config(&config.analytics),
            volatility:  VolatilityEngine::from_config(&config.analytics),
            cache:       RecommendationCache::new(oracle, config.advisory.ttl, config.advisory.oracle_timeout),
            hub,
            price_source,
            counters:    Counters::default(),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Buffered prices for a tracked symbol, oldest first.
    pub fn history(&self, symbol: &str) -> Option<Vec<f64>> {
        self.quotes.contains_key(symbol).then(|| self.history.snapshot(symbol))
    }

    /// Buffer fill for every symbol that has ticked at least once.
    pub fn buffer_stats(&self) -> Vec<BufferStat> {
        self.history
            .symbols()
            .into_iter()
            .map(|symbol| BufferStat {
                count:  self.history.len(&symbol),
                latest: self.history.latest(&symbol),
                symbol,
            })
            .collect()
    }

    /// Current price of every tracked symbol.
    pub fn latest_prices(&self) -> HashMap<String, f64> {
        self.quotes.iter().map(|e| (e.key().clone(), e.value().price)).collect()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            ticks:        self.counters.ticks.load(Ordering::Relaxed),
            snapshots:    self.counters.snapshots.load(Ordering::Relaxed),
            faults:       self.counters.faults.load(Ordering::Relaxed),
            oracle_calls: self.cache.oracle_calls(),
        }
    }

    /// Process every tracked symbol concurrently.
    pub async fn tick_all(self: &Arc<Self>) -> TickReport {
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);

        let handles = self.symbols.iter().map(|symbol| {
            let engine = Arc::clone(self);
            let symbol = symbol.clone();
            tokio::spawn(async move { engine.process_symbol(&symbol).await })
        });
        let results = join_all(handles).await;

        let mut report = TickReport { published: 0, faults: 0 };
        for (symbol, result) in self.symbols.iter().zip(results) {
            match result {
                Ok(Ok(_)) => report.published += 1,
                Ok(Err(e)) => {
                    report.faults += 1;
                    warn!(symbol = %symbol, error = %e, "⚠️ Symbol skipped this tick");
                }
                Err(e) => {
                    report.faults += 1;
                    error!(symbol = %symbol, error = %e, "💥 Symbol processing panicked");
                }
            }
        }

        self.counters.faults.fetch_add(report.faults as u64, Ordering::Relaxed);
        report
    }

    /// One full update for `symbol`; returns the snapshot that was published.
    pub async fn process_symbol(&self, symbol: &str) -> Result<MarketSnapshot, AppError> {
        // ── 1. Next quote ─────────────────────────────────────────────────────
        let last = self
            .quotes
            .get(symbol)
            .map(|q| *q)
            .ok_or_else(|| AppError::NotFound(format!("symbol {symbol} is not tracked")))?;

        let quote = self.price_source.next_quote(symbol, last);
        if !(quote.price.is_finite() && quote.price > 0.0) {
            return Err(AppError::Analytics(format!(
                "price source produced invalid price {} for {symbol}",
                quote.price
            )));
        }
        self.quotes.insert(symbol.to_string(), quote);

        // ── 2. History ────────────────────────────────────────────────────────
        self.history.append(symbol, quote.price);
        let prices = self.history.snapshot(symbol);

        // ── 3. Analytics ──────────────────────────────────────────────────────
        let patterns = (prices.len() >= self.window).then(|| self.detector.detect(&prices));
        let volatility = self.volatility.analyze(&prices)?;

        // ── 4. Advisory ───────────────────────────────────────────────────────
        let context = AdvisoryContext::new(
            &prices,
            quote.volume_24h,
            patterns.clone().unwrap_or_default(),
            volatility.clone(),
        );
        let recommendation = self.cache.get_within(symbol, &context, self.wait_budget).await;
        if recommendation.as_ref().is_some_and(Recommendation::is_fallback) {
            debug!(symbol, "Advisory unavailable — fallback attached");
        }

        // ── 5. Publish ────────────────────────────────────────────────────────
        let tick = PriceTick::new(symbol, quote, Utc::now());
        let mut snapshot = MarketSnapshot::from_tick(&tick, &self.exchange);
        snapshot.patterns = patterns;
        snapshot.volatility = volatility;
        snapshot.recommendation = recommendation;

        let delivered = self
            .hub
            .publish(snapshot.clone())
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        self.counters.snapshots.fetch_add(1, Ordering::Relaxed);
        debug!(symbol, price = quote.price, delivered, "📈 Snapshot published");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SymbolSeed;
    use crate::oracle::heuristic::HeuristicOracle;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed price list per symbol, then repeats the last quote.
    #[derive(Default)]
    struct ScriptedSource {
        scripts: Mutex<HashMap<String, VecDeque<f64>>>,
    }

    impl ScriptedSource {
        fn with(symbol: &str, prices: impl IntoIterator<Item = f64>) -> Self {
            let source = Self::default();
            source.scripts.lock().unwrap().insert(symbol.to_string(), prices.into_iter().collect());
            source
        }
    }

    impl PriceSource for ScriptedSource {
        fn next_quote(&self, symbol: &str, last: Quote) -> Quote {
            if symbol == "BOOM" {
                panic!("feed exploded");
            }
            let next = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(symbol)
                .and_then(|s| s.pop_front())
                .unwrap_or(last.price);
            Quote { price: next, volume_24h: last.volume_24h }
        }
    }

    fn config(symbols: &[&str]) -> Config {
        let mut config = Config::default();
        config.symbols = symbols
            .iter()
            .map(|s| SymbolSeed { symbol: s.to_string(), price: 100.0, volume_24h: 1_000.0 })
            .collect();
        config
    }

    fn engine(symbols: &[&str], source: ScriptedSource) -> Arc<MarketEngine> {
        let config = config(symbols);
        let hub = Arc::new(BroadcastHub::from_config(&config.broadcast));
        Arc::new(MarketEngine::new(&config, Arc::new(HeuristicOracle), Arc::new(source), hub))
    }

    #[tokio::test]
    async fn analytics_appear_once_window_is_full() {
        let engine = engine(&["BTC"], ScriptedSource::with("BTC", (100..=130).map(f64::from)));

        for _ in 0..29 {
            let snapshot = engine.process_symbol("BTC").await.unwrap();
            assert!(snapshot.patterns.is_none());
            assert!(snapshot.volatility.is_none());
        }

        let snapshot = engine.process_symbol("BTC").await.unwrap();
        assert_eq!(snapshot.price, 129.0);
        assert!(snapshot.patterns.is_some());
        assert!(snapshot.volatility.is_some());
        assert!(snapshot.recommendation.is_some());
        assert_eq!(engine.history("BTC").unwrap().len(), 30);
        assert_eq!(
            engine.buffer_stats(),
            vec![BufferStat { symbol: "BTC".into(), count: 30, latest: Some(129.0) }]
        );
    }

    #[tokio::test]
    async fn published_snapshot_becomes_latest() {
        let engine = engine(&["ETH"], ScriptedSource::with("ETH", [101.0]));
        let snapshot = engine.process_symbol("ETH").await.unwrap();

        let latest = engine.hub().latest_snapshots();
        assert_eq!(latest, vec![snapshot]);
        assert_eq!(engine.latest_prices()["ETH"], 101.0);
    }

    #[tokio::test]
    async fn invalid_price_is_a_fault_and_not_stored() {
        let engine = engine(&["BTC", "BAD"], ScriptedSource::with("BAD", [-5.0]));

        let report = engine.tick_all().await;
        assert_eq!(report, TickReport { published: 1, faults: 1 });
        assert!(engine.history("BAD").unwrap().is_empty());
        let buffered: Vec<String> = engine.buffer_stats().into_iter().map(|b| b.symbol).collect();
        assert_eq!(buffered, vec!["BTC".to_string()]);
        assert_eq!(engine.latest_prices()["BAD"], 100.0);
        assert_eq!(engine.stats().faults, 1);
    }

    #[tokio::test]
    async fn panicking_symbol_does_not_affect_others() {
        let engine = engine(&["BTC", "BOOM", "ETH"], ScriptedSource::default());

        let report = engine.tick_all().await;
        assert_eq!(report, TickReport { published: 2, faults: 1 });

        let symbols: Vec<String> = engine.hub().latest_snapshots().into_iter().map(|s| s.symbol).collect();
        assert_eq!(symbols, vec!["BTC".to_string(), "ETH".to_string()]);
    }

    #[tokio::test]
    async fn unknown_symbol_is_not_found() {
        let engine = engine(&["BTC"], ScriptedSource::default());
        assert!(matches!(engine.process_symbol("DOGE").await, Err(AppError::NotFound(_))));
        assert!(engine.history("DOGE").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ticks_lose_no_updates() {
        let symbols = ["A", "B", "C", "D", "E"];
        let engine = engine(&symbols, ScriptedSource::default());

        for _ in 0..40 {
            let report = engine.tick_all().await;
            assert_eq!(report.faults, 0);
        }

        for symbol in symbols {
            assert_eq!(engine.history(symbol).unwrap().len(), 40);
        }
        let stats = engine.stats();
        assert_eq!(stats.ticks, 40);
        assert_eq!(stats.snapshots, 200);
    }
}
