//! # models::snapshot
//!
//! [`MarketSnapshot`] is the unit the market loop assembles for one symbol on
//! one tick and hands to the broadcast hub. The analytics fields are `None`
//! until the history window is full (or while the oracle has nothing ready).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Pattern, PriceTick, Recommendation, VolatilityMetrics};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub symbol:         String,
    pub exchange:       String,
    pub price:          f64,
    pub volume_24h:     f64,
    pub timestamp:      DateTime<Utc>,
    pub patterns:       Option<Vec<Pattern>>,
    pub volatility:     Option<VolatilityMetrics>,
    pub recommendation: Option<Recommendation>,
}

impl MarketSnapshot {
    /// A bare snapshot carrying only the tick itself.
    pub fn from_tick(tick: &PriceTick, exchange: &str) -> Self {
        Self {
            symbol:         tick.symbol.clone(),
            exchange:       exchange.to_string(),
            price:          tick.price,
            volume_24h:     tick.volume_24h,
            timestamp:      tick.timestamp,
            patterns:       None,
            volatility:     None,
            recommendation: None,
        }
    }
}
