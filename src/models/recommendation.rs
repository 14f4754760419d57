//! # models::recommendation
//!
//! The advisory verdict returned by an [`AdvisoryOracle`](crate::oracle::AdvisoryOracle)
//! and held by the recommendation cache until its TTL runs out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub action:     Action,
    /// Clamped to `[0, 1]` by [`Recommendation::new`].
    pub confidence: f64,
    /// Ordered bullet points explaining the verdict.
    pub reasoning:  Vec<String>,
    /// Free-form market mood, e.g. `"bullish"`, `"neutral"`.
    pub sentiment:  String,
    pub risk_level: RiskLevel,
    pub fetched_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn new(
        action:     Action,
        confidence: f64,
        reasoning:  Vec<String>,
        sentiment:  impl Into<String>,
        risk_level: RiskLevel,
    ) -> Self {
        let confidence = if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            action,
            confidence,
            reasoning,
            sentiment:  sentiment.into(),
            risk_level,
            fetched_at: Utc::now(),
        }
    }

    /// Substituted (and cached) whenever the oracle fails or times out.
    pub fn fallback() -> Self {
        Self::new(
            Action::Hold,
            0.5,
            vec!["insufficient data".to_string()],
            "neutral",
            RiskLevel::Medium,
        )
    }

    pub fn is_fallback(&self) -> bool {
        self.action == Action::Hold
            && self.confidence == 0.5
            && self.sentiment == "neutral"
            && self.risk_level == RiskLevel::Medium
            && self.reasoning == ["insufficient data"]
    }
}
