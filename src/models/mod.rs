//! Domain models shared across the entire Market Pulse system.

pub mod analytics;
pub mod portfolio;
pub mod recommendation;
pub mod snapshot;
pub mod tick;

pub use analytics::{Pattern, PatternType, VolatilityMetrics, VolatilityTrend};
pub use portfolio::{
    Holding, HistoryKind, HistoryPoint, PortfolioValuation, Timeframe, TradeEvent, TradeMarker,
    TradeSide,
};
pub use recommendation::{Action, Recommendation, RiskLevel};
pub use snapshot::MarketSnapshot;
pub use tick::{PriceTick, Quote};
