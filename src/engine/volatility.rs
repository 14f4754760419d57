//! # engine::volatility
//!
//! **Volatility Engine** — log-return statistics over the price buffer.
//!
//! ## Outputs
//! * `historical_volatility` — σ(all returns) × √annualization_days
//! * `relative_volatility`   — σ(last `window` returns) annualised ÷ historical
//! * `trend`                 — recent vs historical with a ±10% band
//! * `value_at_risk`         — −sorted[floor(n × tail)]
//! * `expected_shortfall`    — −mean(sorted[..floor(n × tail)])
//!
//! σ is the population standard deviation. Fewer than `window` prices, or a
//! tail index of 0 (too few returns for the configured tail), is reported as
//! `Ok(None)`. A non-positive or non-finite price is an error.

use crate::config::AnalyticsConfig;
use crate::error::AppError;
use crate::models::{VolatilityMetrics, VolatilityTrend};

const TREND_UPPER: f64 = 1.1;
const TREND_LOWER: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct VolatilityEngine {
    window:             usize,
    annualization_days: f64,
    var_tail:           f64,
}

impl VolatilityEngine {
    pub fn new(window: usize, annualization_days: f64, var_tail: f64) -> Self {
        Self { window: window.max(2), annualization_days, var_tail }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.window, config.annualization_days, config.var_tail)
    }

    pub fn analyze(&self, prices: &[f64]) -> Result<Option<VolatilityMetrics>, AppError> {
        if prices.len() < self.window {
            return Ok(None);
        }

        let returns = log_returns(prices)?;
        let annualize = self.annualization_days.sqrt();

        let historical = std_dev(&returns) * annualize;
        let recent_returns = &returns[returns.len().saturating_sub(self.window)..];
        let recent = std_dev(recent_returns) * annualize;

        // flat history: recent and historical are both zero
        let relative = if historical > 0.0 { recent / historical } else { 1.0 };

        let trend = if recent > historical * TREND_UPPER {
            VolatilityTrend::Increasing
        } else if recent < historical * TREND_LOWER {
            VolatilityTrend::Decreasing
        } else {
            VolatilityTrend::Stable
        };

        let mut sorted = returns;
        sorted.sort_by(f64::total_cmp);

        let var_index = (sorted.len() as f64 * self.var_tail).floor() as usize;
        if var_index == 0 || var_index >= sorted.len() {
            return Ok(None);
        }

        let value_at_risk = -sorted[var_index];
        let tail = &sorted[..var_index];
        let expected_shortfall = -(tail.iter().sum::<f64>() / tail.len() as f64);

        Ok(Some(VolatilityMetrics {
            historical_volatility: historical,
            relative_volatility:   relative,
            trend,
            value_at_risk,
            expected_shortfall,
        }))
    }
}

fn log_returns(prices: &[f64]) -> Result<Vec<f64>, AppError> {
    if let Some(bad) = prices.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
        return Err(AppError::Analytics(format!("cannot take log return of price {bad}")));
    }
    Ok(prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect())
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
