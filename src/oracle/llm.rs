//! # oracle::llm — Claude or OpenAI as the advisory oracle
//!
//! Selected through `AI_PROVIDER`. The model's reply is expected to be the
//! JSON object requested by [`build_prompt`]; markdown fences are stripped
//! before parsing.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AiProvider;
use crate::models::{Action, Recommendation, RiskLevel};
use crate::oracle::{prompt::build_prompt, AdvisoryContext, AdvisoryOracle, OracleError};

pub struct LlmOracle {
    client:   reqwest::Client,
    provider: AiProvider,
    api_key:  String,
    timeout:  Duration,
}

impl LlmOracle {
    pub fn new(client: reqwest::Client, provider: AiProvider, api_key: String, timeout: Duration) -> Self {
        Self { client, provider, api_key, timeout }
    }
}

#[async_trait]
impl AdvisoryOracle for LlmOracle {
    async fn advise(
        &self,
        symbol:  &str,
        context: &AdvisoryContext,
    ) -> Result<Recommendation, OracleError> {
        let prompt = build_prompt(symbol, context);
        let text = match self.provider {
            AiProvider::Claude => self.call_claude(&prompt).await?,
            AiProvider::OpenAi => self.call_openai(&prompt).await?,
            AiProvider::None   => {
                return Err(OracleError::Transport("no AI provider configured".into()))
            }
        };
        debug!(symbol, chars = text.len(), "AI reply received");
        parse_recommendation(&text)
    }

    fn name(&self) -> &'static str {
        match self.provider {
            AiProvider::Claude => "claude",
            AiProvider::OpenAi => "openai",
            AiProvider::None   => "none",
        }
    }
}

// ─── Anthropic Claude ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model:      &'a str,
    max_tokens: u32,
    messages:   Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role:    &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    text: String,
}

// ─── OpenAI ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model:    &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMsg,
}

#[derive(Deserialize)]
struct OpenAiChoiceMsg {
    content: Option<String>,
}

impl LlmOracle {
    async fn call_claude(&self, prompt: &str) -> Result<String, OracleError> {
        let body = ClaudeRequest {
            model:      "claude-3-5-sonnet-20241022",
            max_tokens: 400,
            messages:   vec![ChatMessage { role: "user", content: prompt }],
        };

        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let data: ClaudeResponse = read_json(resp).await?;
        data.content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| OracleError::Parse("Claude returned empty content".into()))
    }

    async fn call_openai(&self, prompt: &str) -> Result<String, OracleError> {
        let body = OpenAiRequest {
            model:    "gpt-4o",
            messages: vec![
                ChatMessage { role: "system", content: "You are an expert market analyst. Always respond with valid JSON only." },
                ChatMessage { role: "user",   content: prompt },
            ],
        };

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let data: OpenAiResponse = read_json(resp).await?;
        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Parse("OpenAI returned empty content".into()))
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> OracleError {
    if err.is_timeout() {
        OracleError::Timeout(timeout)
    } else {
        OracleError::Transport(err.to_string())
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T, OracleError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(OracleError::Api { status, body });
    }
    resp.json().await.map_err(|e| OracleError::Parse(e.to_string()))
}

// ─── Reply Parsing ────────────────────────────────────────────────────────────

/// Shape the prompt asks the model for.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiRecommendationJson {
    action:     String,
    confidence: f64,
    #[serde(default)]
    reasoning:  Vec<String>,
    #[serde(default)]
    sentiment:  Option<String>,
    #[serde(default, alias = "risk_level")]
    risk_level: Option<String>,
}

pub fn parse_recommendation(text: &str) -> Result<Recommendation, OracleError> {
    let cleaned = strip_markdown(text);
    let parsed: AiRecommendationJson = serde_json::from_str(&cleaned)
        .map_err(|e| OracleError::Parse(format!("{e}: {cleaned}")))?;

    let action = match parsed.action.trim().to_lowercase().as_str() {
        "buy"  => Action::Buy,
        "sell" => Action::Sell,
        "hold" => Action::Hold,
        other  => return Err(OracleError::Parse(format!("unknown action '{other}'"))),
    };

    let risk_level = match parsed.risk_level.as_deref().map(|r| r.trim().to_lowercase()) {
        Some(r) if r == "low"  => RiskLevel::Low,
        Some(r) if r == "high" => RiskLevel::High,
        _ => RiskLevel::Medium,
    };

    Ok(Recommendation::new(
        action,
        parsed.confidence,
        parsed.reasoning,
        parsed.sentiment.unwrap_or_else(|| "neutral".to_string()),
        risk_level,
    ))
}

/// Remove the markdown code fences models like to wrap JSON in.
fn strip_markdown(text: &str) -> String {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix("```json") {
        inner.trim_end_matches("```").trim().to_string()
    } else if let Some(inner) = text.strip_prefix("```") {
        inner.trim_end_matches("```").trim().to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_reply() {
        let rec = parse_recommendation(
            r#"{"action":"BUY","confidence":0.82,"reasoning":["breakout","volume up"],"sentiment":"bullish","riskLevel":"low"}"#,
        )
        .unwrap();
        assert_eq!(rec.action, Action::Buy);
        assert_eq!(rec.confidence, 0.82);
        assert_eq!(rec.reasoning, vec!["breakout", "volume up"]);
        assert_eq!(rec.sentiment, "bullish");
        assert_eq!(rec.risk_level, RiskLevel::Low);
    }

    #[test]
    fn parses_fenced_reply_with_defaults() {
        let rec = parse_recommendation("```json\n{\"action\":\"sell\",\"confidence\":3}\n```").unwrap();
        assert_eq!(rec.action, Action::Sell);
        assert_eq!(rec.confidence, 1.0);
        assert_eq!(rec.sentiment, "neutral");
        assert_eq!(rec.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn rejects_unknown_action_and_garbage() {
        assert!(matches!(
            parse_recommendation(r#"{"action":"moon","confidence":1}"#),
            Err(OracleError::Parse(_))
        ));
        assert!(matches!(parse_recommendation("I think BTC goes up"), Err(OracleError::Parse(_))));
    }
}
