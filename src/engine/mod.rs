//! # engine
//!
//! Market-side processing: price history, the two analysis kernels, the
//! price source and the [`MarketEngine`] that ties them together per tick.

pub mod history;
pub mod market;
pub mod pattern;
pub mod price_source;
pub mod volatility;

pub use history::PriceHistoryBuffer;
pub use market::MarketEngine;
pub use pattern::PatternDetector;
pub use price_source::{PriceSource, RandomWalk};
pub use volatility::VolatilityEngine;
