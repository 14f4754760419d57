//! # events
//!
//! Defines [`MarketMessage`], the JSON frame every WebSocket subscriber
//! receives: one per symbol per tick, plus one per symbol on connect.
//!
//! Frames are serialized once by the broadcast hub and fanned out as the
//! same `Arc<str>`, so late joiners get byte-identical payloads.
//!
//! ```json
//! { "symbol": "BTC", "exchange": "binance", "price": 95012.5,
//!   "volume24h": 28000000000.0, "timestamp": 1760000000,
//!   "patternAnalysis":   { "patterns": [...] },
//!   "volatilityMetrics": { ..., "riskMetrics": { "valueAtRisk": ..., "expectedShortfall": ... } },
//!   "aiAnalysis":        { "recommendation": "buy", ... } }
//! ```

use serde::Serialize;

use crate::models::{
    Action, MarketSnapshot, Pattern, Recommendation, RiskLevel, VolatilityMetrics, VolatilityTrend,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketMessage<'a> {
    pub symbol:     &'a str,
    pub exchange:   &'a str,
    pub price:      f64,
    pub volume_24h: f64,
    /// Unix seconds.
    pub timestamp:  i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_analysis:   Option<PatternAnalysis<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatility_metrics: Option<VolatilityBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis:        Option<AiAnalysis<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternAnalysis<'a> {
    pub patterns: &'a [Pattern],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilityBlock {
    pub historical_volatility: f64,
    pub relative_volatility:   f64,
    pub volatility_trend:      VolatilityTrend,
    pub risk_metrics:          RiskMetrics,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub value_at_risk:      f64,
    pub expected_shortfall: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis<'a> {
    pub recommendation:   Action,
    pub confidence:       f64,
    pub reasoning:        &'a [String],
    pub market_sentiment: &'a str,
    pub risk_level:       RiskLevel,
}

impl From<&VolatilityMetrics> for VolatilityBlock {
    fn from(v: &VolatilityMetrics) -> Self {
        Self {
            historical_volatility: v.historical_volatility,
            relative_volatility:   v.relative_volatility,
            volatility_trend:      v.trend,
            risk_metrics: RiskMetrics {
                value_at_risk:      v.value_at_risk,
                expected_shortfall: v.expected_shortfall,
            },
        }
    }
}

impl<'a> From<&'a Recommendation> for AiAnalysis<'a> {
    fn from(r: &'a Recommendation) -> Self {
        Self {
            recommendation:   r.action,
            confidence:       r.confidence,
            reasoning:        &r.reasoning,
            market_sentiment: &r.sentiment,
            risk_level:       r.risk_level,
        }
    }
}

impl<'a> From<&'a MarketSnapshot> for MarketMessage<'a> {
    fn from(s: &'a MarketSnapshot) -> Self {
        Self {
            symbol:             &s.symbol,
            exchange:           &s.exchange,
            price:              s.price,
            volume_24h:         s.volume_24h,
            timestamp:          s.timestamp.timestamp(),
            pattern_analysis:   s.patterns.as_deref().map(|patterns| PatternAnalysis { patterns }),
            volatility_metrics: s.volatility.as_ref().map(VolatilityBlock::from),
            ai_analysis:        s.recommendation.as_ref().map(AiAnalysis::from),
        }
    }
}

impl MarketMessage<'_> {
    /// Serialize for the WebSocket.
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!(r#"{{"symbol":"{}","error":"SERIALIZATION_ERROR"}}"#, self.symbol))
    }
}
