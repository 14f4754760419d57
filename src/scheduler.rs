//! # scheduler
//!
//! Drives the two periodic loops:
//!
//! | Loop        | Every                   | Work                                        |
//! |-------------|-------------------------|---------------------------------------------|
//! | `market`    | `TICK_INTERVAL_MS`      | [`MarketEngine::tick_all`]                  |
//! | `portfolio` | `PORTFOLIO_INTERVAL_MS` | [`PortfolioValuer::value_and_record`] × user |
//!
//! Each loop is `Stopped → Running → Stopped`. `start` on a running loop is
//! a no-op; `stop` signals the loop, waits for it to exit and may be called
//! any number of times. Every tick runs in its own task, so a panicking tick
//! is logged and the next tick still fires.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::engine::MarketEngine;
use crate::portfolio::PortfolioValuer;

// ─── Periodic Loop ────────────────────────────────────────────────────────────

enum LoopState {
    Stopped,
    Running {
        shutdown: watch::Sender<bool>,
        handle:   JoinHandle<()>,
    },
}

pub struct PeriodicLoop {
    name:   &'static str,
    period: Duration,
    state:  Mutex<LoopState>,
}

impl PeriodicLoop {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self { name, period, state: Mutex::new(LoopState::Stopped) }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            LoopState::Running { .. }
        )
    }

    /// Start ticking `work` every period. Returns `false` if already running.
    pub fn start<F, Fut>(&self, work: F) -> bool
    where
        F:   Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, LoopState::Running { .. }) {
            debug!(task = self.name, "Loop already running");
            return false;
        }

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(run(self.name, self.period, work, rx));
        *state = LoopState::Running { shutdown, handle };

        info!(task = self.name, period = ?self.period, "▶️ Loop started");
        true
    }

    /// Signal the loop and wait for it to exit. Returns `false` if it was
    /// not running.
    pub async fn stop(&self) -> bool {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, LoopState::Stopped)
        };

        match previous {
            LoopState::Stopped => false,
            LoopState::Running { shutdown, handle } => {
                let _ = shutdown.send(true);
                if let Err(e) = handle.await {
                    error!(task = self.name, error = %e, "Loop task ended abnormally");
                }
                true
            }
        }
    }
}

async fn run<F, Fut>(name: &'static str, period: Duration, work: F, mut shutdown: watch::Receiver<bool>)
where
    F:   Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = tokio::spawn(work()).await {
                    error!(task = name, error = %e, "💥 Tick panicked — loop continues");
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    info!(task = name, "⏹️ Loop stopped");
}

// ─── Scheduler ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub market:    bool,
    pub portfolio: bool,
}

pub struct Scheduler {
    engine:    Arc<MarketEngine>,
    valuer:    Arc<PortfolioValuer>,
    market:    PeriodicLoop,
    portfolio: PeriodicLoop,
}

impl Scheduler {
    pub fn new(
        engine:             Arc<MarketEngine>,
        valuer:             Arc<PortfolioValuer>,
        tick_interval:      Duration,
        portfolio_interval: Duration,
    ) -> Self {
        Self {
            engine,
            valuer,
            market:    PeriodicLoop::new("market", tick_interval),
            portfolio: PeriodicLoop::new("portfolio", portfolio_interval),
        }
    }

    pub fn start(&self) {
        self.start_market();
        self.start_portfolio();
    }

    pub async fn stop(&self) {
        self.stop_market().await;
        self.stop_portfolio().await;
    }

    pub fn start_market(&self) -> bool {
        let engine = Arc::clone(&self.engine);
        self.market.start(move || {
            let engine = Arc::clone(&engine);
            async move {
                let report = engine.tick_all().await;
                debug!(published = report.published, faults = report.faults, "Market tick done");
            }
        })
    }

    pub async fn stop_market(&self) -> bool {
        self.market.stop().await
    }

    pub fn start_portfolio(&self) -> bool {
        let engine = Arc::clone(&self.engine);
        let valuer = Arc::clone(&self.valuer);
        self.portfolio.start(move || {
            let engine = Arc::clone(&engine);
            let valuer = Arc::clone(&valuer);
            async move { value_portfolios(&engine, &valuer).await }
        })
    }

    pub async fn stop_portfolio(&self) -> bool {
        self.portfolio.stop().await
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            market:    self.market.is_running(),
            portfolio: self.portfolio.is_running(),
        }
    }
}

/// One portfolio cycle. Failures are logged; the next cycle retries.
async fn value_portfolios(engine: &MarketEngine, valuer: &PortfolioValuer) {
    let users = match valuer.ledger().list_users().await {
        Ok(users) => users,
        Err(e) => {
            warn!(error = %e, "❌ Could not list users — portfolio cycle skipped");
            return;
        }
    };

    let prices = engine.latest_prices();
    for user in users {
        match valuer.value_and_record(&user, &prices).await {
            Ok(total) => debug!(user_id = %user, total, "💼 Portfolio valued"),
            Err(e)    => warn!(user_id = %user, error = %e, "❌ Portfolio valuation failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::RandomWalk;
    use crate::hub::BroadcastHub;
    use crate::oracle::heuristic::HeuristicOracle;
    use crate::portfolio::ledger::DEMO_USER;
    use crate::portfolio::{InMemoryLedger, LedgerStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn scheduler() -> (Scheduler, Arc<MarketEngine>, Arc<InMemoryLedger>) {
        let config = Config::default();
        let hub = Arc::new(BroadcastHub::from_config(&config.broadcast));
        let engine = Arc::new(MarketEngine::new(
            &config,
            Arc::new(HeuristicOracle),
            Arc::new(RandomWalk::new(config.walk_step)),
            hub,
        ));
        let ledger = Arc::new(InMemoryLedger::with_demo_user().await);
        let valuer = Arc::new(PortfolioValuer::new(ledger.clone()));
        let scheduler = Scheduler::new(
            Arc::clone(&engine),
            valuer,
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        (scheduler, engine, ledger)
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_and_stop_is_repeatable() {
        let (scheduler, _, _) = scheduler().await;

        assert!(scheduler.start_market());
        assert!(!scheduler.start_market());
        assert!(scheduler.status().market);

        assert!(scheduler.stop_market().await);
        assert!(!scheduler.stop_market().await);
        assert!(!scheduler.status().market);

        // restartable after stop
        assert!(scheduler.start_market());
        scheduler.stop().await;
        assert_eq!(scheduler.status(), SchedulerStatus { market: false, portfolio: false });
    }

    #[tokio::test(start_paused = true)]
    async fn market_loop_ticks_every_period() {
        let (scheduler, engine, _) = scheduler().await;
        scheduler.start_market();

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        scheduler.stop().await;

        let ticks = engine.stats().ticks;
        assert!(ticks >= 3, "only {ticks} ticks");
        assert_eq!(engine.hub().latest_snapshots().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn portfolio_loop_records_valuations() {
        let (scheduler, _, ledger) = scheduler().await;
        scheduler.start_portfolio();

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        scheduler.stop().await;

        // 15 seeded points + at least two real ones
        let history = ledger.get_valuation_history(DEMO_USER, None).await.unwrap();
        assert!(history.len() >= 17, "only {} valuations", history.len());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_tick_does_not_stop_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let looped = PeriodicLoop::new("flaky", Duration::from_secs(1));

        let counter = Arc::clone(&calls);
        looped.start(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    panic!("first tick fails");
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(looped.is_running());
        assert!(looped.stop().await);
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }
}
