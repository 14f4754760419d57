//! # oracle::heuristic — Local rule-based oracle
//!
//! Used when no AI provider is configured so the feed still carries an
//! `aiAnalysis` block in development. Scores momentum, pattern hits and the
//! volatility regime; never fails.

use async_trait::async_trait;

use crate::models::{Action, PatternType, Recommendation, RiskLevel, VolatilityTrend};
use crate::oracle::{AdvisoryContext, AdvisoryOracle, OracleError};

/// % move over the buffer treated as meaningful momentum.
const MOMENTUM_PCT: f64 = 0.5;
/// Daily VaR (log-return) above which risk is called high.
const HIGH_VAR: f64 = 0.02;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicOracle;

#[async_trait]
impl AdvisoryOracle for HeuristicOracle {
    async fn advise(
        &self,
        _symbol: &str,
        context: &AdvisoryContext,
    ) -> Result<Recommendation, OracleError> {
        Ok(evaluate(context))
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

fn evaluate(context: &AdvisoryContext) -> Recommendation {
    let mut score = 0.0;
    let mut reasoning = Vec::new();

    // ── 1. Momentum ───────────────────────────────────────────────────────────
    if context.price_change_pct >= MOMENTUM_PCT {
        score += 1.0;
        reasoning.push(format!("price up {:.2}% over recent history", context.price_change_pct));
    } else if context.price_change_pct <= -MOMENTUM_PCT {
        score -= 1.0;
        reasoning.push(format!("price down {:.2}% over recent history", context.price_change_pct.abs()));
    } else {
        reasoning.push("price range-bound".to_string());
    }

    // ── 2. Patterns ───────────────────────────────────────────────────────────
    let strongest = |kind: PatternType| {
        context
            .patterns
            .iter()
            .filter(|p| p.pattern_type == kind)
            .map(|p| p.confidence)
            .fold(0.0_f64, f64::max)
    };
    let head_and_shoulders = strongest(PatternType::HeadAndShoulders);
    if head_and_shoulders > 0.0 {
        score -= head_and_shoulders;
        reasoning.push(format!("head and shoulders formation ({head_and_shoulders:.2})"));
    }
    let triangle = strongest(PatternType::Triangle);
    if triangle > 0.0 {
        reasoning.push(format!("triangle consolidation ({triangle:.2})"));
    }

    // ── 3. Volatility regime ──────────────────────────────────────────────────
    let risk_level = match &context.volatility {
        Some(v) if v.value_at_risk > HIGH_VAR || v.trend == VolatilityTrend::Increasing => {
            reasoning.push(format!("volatility {:?}, VaR {:.4}", v.trend, v.value_at_risk));
            RiskLevel::High
        }
        Some(v) if v.trend == VolatilityTrend::Decreasing => {
            reasoning.push("volatility contracting".to_string());
            RiskLevel::Low
        }
        Some(_) => RiskLevel::Medium,
        None => {
            reasoning.push("volatility window not yet full".to_string());
            RiskLevel::Medium
        }
    };

    let (action, sentiment) = if score >= 1.0 {
        (Action::Buy, "bullish")
    } else if score <= -1.0 {
        (Action::Sell, "bearish")
    } else {
        (Action::Hold, "neutral")
    };
    let confidence = 0.5 + (score.abs() / 4.0).min(0.4);

    Recommendation::new(action, confidence, reasoning, sentiment, risk_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pattern, VolatilityMetrics};

    fn context(change: f64) -> AdvisoryContext {
        AdvisoryContext {
            price:            100.0,
            volume_24h:       0.0,
            price_change_pct: change,
            patterns:         vec![],
            volatility:       None,
        }
    }

    #[tokio::test]
    async fn rising_price_is_a_buy() {
        let rec = HeuristicOracle.advise("BTC", &context(2.0)).await.unwrap();
        assert_eq!(rec.action, Action::Buy);
        assert_eq!(rec.sentiment, "bullish");
        assert!(rec.confidence > 0.5 && rec.confidence <= 0.9);
    }

    #[tokio::test]
    async fn flat_price_is_a_hold() {
        let rec = HeuristicOracle.advise("BTC", &context(0.1)).await.unwrap();
        assert_eq!(rec.action, Action::Hold);
        assert_eq!(rec.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn head_and_shoulders_with_drop_is_a_sell_in_high_risk() {
        let mut ctx = context(-0.6);
        ctx.patterns.push(Pattern {
            pattern_type: PatternType::HeadAndShoulders,
            confidence:   0.9,
            start_index:  0,
            end_index:    4,
        });
        ctx.volatility = Some(VolatilityMetrics {
            historical_volatility: 0.5,
            relative_volatility:   1.3,
            trend:                 VolatilityTrend::Increasing,
            value_at_risk:         0.01,
            expected_shortfall:    0.015,
        });
        let rec = HeuristicOracle.advise("ETH", &ctx).await.unwrap();
        assert_eq!(rec.action, Action::Sell);
        assert_eq!(rec.risk_level, RiskLevel::High);
        assert!(rec.reasoning.iter().any(|r| r.contains("head and shoulders")));
    }
}
