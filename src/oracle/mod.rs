//! # oracle — Advisory Oracle
//!
//! The external collaborator that turns a symbol's analytics into a
//! buy / sell / hold [`Recommendation`]. Calls are slow and may fail, so the
//! market loop only ever reaches an oracle through the
//! [`RecommendationCache`](cache::RecommendationCache).
//!
//! | Implementation                  | Selected when            |
//! |---------------------------------|--------------------------|
//! | [`heuristic::HeuristicOracle`]  | `AI_PROVIDER=none`       |
//! | [`llm::LlmOracle`]              | `AI_PROVIDER=claude/openai` |

pub mod cache;
pub mod heuristic;
pub mod llm;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::{AdvisoryConfig, AiProvider};
use crate::models::{Pattern, Recommendation, VolatilityMetrics};

// ─── Context ──────────────────────────────────────────────────────────────────

/// Everything the oracle is told about a symbol on one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryContext {
    pub price:            f64,
    pub volume_24h:       f64,
    /// % change from the oldest buffered price to `price`.
    pub price_change_pct: f64,
    pub patterns:         Vec<Pattern>,
    pub volatility:       Option<VolatilityMetrics>,
}

impl AdvisoryContext {
    pub fn new(
        history:    &[f64],
        volume_24h: f64,
        patterns:   Vec<Pattern>,
        volatility: Option<VolatilityMetrics>,
    ) -> Self {
        let price = history.last().copied().unwrap_or(0.0);
        let first = history.first().copied().unwrap_or(price);
        let price_change_pct = if first > 0.0 { (price - first) / first * 100.0 } else { 0.0 };
        Self { price, volume_24h, price_change_pct, patterns, volatility }
    }
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle unreachable: {0}")]
    Transport(String),

    #[error("oracle returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("oracle reply could not be parsed: {0}")]
    Parse(String),

    #[error("oracle did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

// ─── Trait ────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait AdvisoryOracle: Send + Sync {
    async fn advise(
        &self,
        symbol:  &str,
        context: &AdvisoryContext,
    ) -> Result<Recommendation, OracleError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Build the oracle selected by `AI_PROVIDER`.
pub fn build_oracle(config: &AdvisoryConfig, client: reqwest::Client) -> Arc<dyn AdvisoryOracle> {
    match (config.provider, config.api_key.clone()) {
        (AiProvider::Claude | AiProvider::OpenAi, Some(api_key)) => Arc::new(llm::LlmOracle::new(
            client,
            config.provider,
            api_key,
            config.oracle_timeout,
        )),
        _ => Arc::new(heuristic::HeuristicOracle),
    }
}
