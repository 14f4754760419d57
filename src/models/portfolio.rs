//! # models::portfolio
//!
//! Ledger-side records. The core never writes holdings or trades; it only
//! reads them through the [`LedgerStore`](crate::portfolio::LedgerStore) and
//! appends [`PortfolioValuation`]s.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ─── Ledger Records ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub user_id:      String,
    pub symbol:       String,
    pub quantity:     f64,
    pub average_cost: f64,
}

/// Append-only valuation sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioValuation {
    pub user_id:     String,
    pub total_value: f64,
    pub timestamp:   DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    pub user_id:   String,
    pub symbol:    String,
    pub side:      TradeSide,
    pub quantity:  f64,
    pub price:     f64,
    pub timestamp: DateTime<Utc>,
}

// ─── History Series ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Valuation,
    Trade,
}

/// Trade details carried by a [`HistoryKind::Trade`] point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeMarker {
    pub symbol:   String,
    pub side:     TradeSide,
    pub quantity: f64,
    pub price:    f64,
}

/// One point of the merged chart series.
///
/// `id` is the position in the returned series — not stable across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub id:        usize,
    pub timestamp: DateTime<Utc>,
    pub value:     f64,
    pub kind:      HistoryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade:     Option<TradeMarker>,
}

// ─── Timeframe ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1D")]
    Day,
    #[default]
    #[serde(rename = "1W")]
    Week,
    #[serde(rename = "1M")]
    Month,
    #[serde(rename = "3M")]
    Quarter,
    #[serde(rename = "1Y")]
    Year,
    #[serde(rename = "ALL")]
    All,
}

impl Timeframe {
    /// Earliest timestamp included by this timeframe, `None` for [`Timeframe::All`].
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let span = match self {
            Timeframe::Day     => Duration::days(1),
            Timeframe::Week    => Duration::days(7),
            Timeframe::Month   => Duration::days(30),
            Timeframe::Quarter => Duration::days(90),
            Timeframe::Year    => Duration::days(365),
            Timeframe::All     => return None,
        };
        Some(now - span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_parses_wire_names() {
        let tf: Timeframe = serde_json::from_str("\"3M\"").unwrap();
        assert_eq!(tf, Timeframe::Quarter);
        let tf: Timeframe = serde_json::from_str("\"ALL\"").unwrap();
        assert_eq!(tf, Timeframe::All);
    }

    #[test]
    fn timeframe_since() {
        let now = Utc::now();
        assert_eq!(Timeframe::Week.since(now), Some(now - Duration::days(7)));
        assert_eq!(Timeframe::All.since(now), None);
    }
}
