//! # engine::price_source
//!
//! Where the market loop gets its next quote from. The live server uses
//! [`RandomWalk`]; tests plug in deterministic sources through the
//! [`PriceSource`] trait.

use rand::Rng;

use crate::models::Quote;

pub trait PriceSource: Send + Sync {
    /// Produce the next quote for `symbol` given the previous one.
    fn next_quote(&self, symbol: &str, last: Quote) -> Quote;
}

/// Bounded multiplicative random walk: each tick moves the price by a uniform
/// factor in `[-step, +step]` and the 24h volume by ten times that band.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    step: f64,
}

impl RandomWalk {
    pub fn new(step: f64) -> Self {
        Self { step: step.abs() }
    }
}

impl PriceSource for RandomWalk {
    fn next_quote(&self, _symbol: &str, last: Quote) -> Quote {
        let mut rng = rand::thread_rng();
        let (price_move, volume_move) = if self.step > 0.0 {
            (
                rng.gen_range(-self.step..=self.step),
                rng.gen_range(-self.step * 10.0..=self.step * 10.0),
            )
        } else {
            (0.0, 0.0)
        };

        Quote {
            price:      last.price * (1.0 + price_move),
            volume_24h: (last.volume_24h * (1.0 + volume_move)).max(0.0),
        }
    }
}
