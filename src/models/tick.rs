//! # models::tick
//!
//! Defines [`PriceTick`], the market pulse the price source produces for every
//! tracked symbol on each market-loop cycle, and [`Quote`], the compact
//! per-symbol state the random walk steps from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The last price/volume pair known for a symbol.
///
/// Kept `Copy` so the market loop can read it out of the quote map without
/// holding the shard lock across any analysis work.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub price:      f64,
    pub volume_24h: f64,
}

/// A single simulated price tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTick {
    /// The trading symbol, e.g. `"BTC"`, `"ETH"`.
    pub symbol: String,

    /// Last traded price.
    pub price: f64,

    /// Rolling 24h traded volume (simulated).
    pub volume_24h: f64,

    /// UTC timestamp of the tick.
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    pub fn new(symbol: &str, quote: Quote, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol:     symbol.to_string(),
            price:      quote.price,
            volume_24h: quote.volume_24h,
            timestamp,
        }
    }
}
