//! # models::analytics
//!
//! Output types of the two analysis engines: chart [`Pattern`]s from the
//! pattern detector and [`VolatilityMetrics`] from the volatility engine.
//!
//! Both are ephemeral — recomputed from a history snapshot on every tick and
//! only ever attached to the [`MarketSnapshot`](super::MarketSnapshot) of that
//! tick.

use serde::{Deserialize, Serialize};

// ─── Pattern ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Triangle,
    HeadAndShoulders,
    // Part of the wire vocabulary; no kernel emits these yet.
    #[allow(dead_code)]
    DoubleTop,
    #[allow(dead_code)]
    DoubleBottom,
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PatternType::Triangle         => "triangle",
            PatternType::HeadAndShoulders => "head_and_shoulders",
            PatternType::DoubleTop        => "double_top",
            PatternType::DoubleBottom     => "double_bottom",
        };
        f.write_str(name)
    }
}

/// A shape match inside the analysis window.
///
/// `start_index` / `end_index` are positions relative to the window (0 is the
/// oldest price of the window), both inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    /// Always within `[0, 1]`.
    pub confidence:   f64,
    pub start_index:  usize,
    pub end_index:    usize,
}

// ─── Volatility ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilityMetrics {
    /// Annualised standard deviation of all log returns in the buffer.
    pub historical_volatility: f64,
    /// Recent (window) volatility divided by the historical one.
    pub relative_volatility:   f64,
    pub trend:                 VolatilityTrend,
    /// Loss at the configured tail quantile, as a positive log-return.
    pub value_at_risk:         f64,
    /// Mean loss strictly beyond the VaR quantile.
    pub expected_shortfall:    f64,
}
