//! # oracle::prompt — Prompt for the advisory LLM
//!
//! The model must answer with JSON that parses straight into a
//! [`Recommendation`](crate::models::Recommendation).

use crate::oracle::AdvisoryContext;

pub fn build_prompt(symbol: &str, context: &AdvisoryContext) -> String {
    let pattern_line = if context.patterns.is_empty() {
        "- Patterns: none detected".to_string()
    } else {
        let hits: Vec<String> = context
            .patterns
            .iter()
            .map(|p| format!("{} ({:.2}, idx {}-{})", p.pattern_type, p.confidence, p.start_index, p.end_index))
            .collect();
        format!("- Patterns: {}", hits.join(", "))
    };

    let volatility_line = match &context.volatility {
        Some(v) => format!(
            "- Volatility: historical {hv:.4} | relative {rv:.2} | trend {trend:?} | VaR {var:.5} | ES {es:.5}",
            hv    = v.historical_volatility,
            rv    = v.relative_volatility,
            trend = v.trend,
            var   = v.value_at_risk,
            es    = v.expected_shortfall,
        ),
        None => "- Volatility: N/A (insufficient history)".to_string(),
    };

    format!(r#"You are an expert market analyst reviewing {symbol}.

## Current Market Data
- Symbol: {symbol}
- Price: {price:.4}
- 24H Volume: {volume:.0}
- Change over buffered history: {change:+.3}%
{pattern_line}
{volatility_line}

## Your Task
Give a short-term recommendation for {symbol}.

**CRITICAL**: Respond with ONLY a valid JSON object. No explanations, no markdown, no code fences.

## Required JSON Format
```
{{
  "action": "buy" | "sell" | "hold",
  "confidence": <float 0.0-1.0>,
  "reasoning": ["<point>", "<point>"],
  "sentiment": "bullish" | "bearish" | "neutral",
  "riskLevel": "low" | "medium" | "high"
}}
```

Respond with JSON only:"#,
        price  = context.price,
        volume = context.volume_24h,
        change = context.price_change_pct,
    )
}
