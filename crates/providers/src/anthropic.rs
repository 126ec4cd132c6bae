//! Anthropic Messages API adapter.
//!
//! Wire format and status-code error mapping match the Messages API
//! precisely.

use crate::traits::{GenerateRequest, GenerateResponse, HistoryTurn, RawProvider};
use orc_domain::config::ProviderConfig;
use orc_domain::error::{Error, Result};
use serde_json::Value;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: normalize_model(&cfg.model),
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}

/// Any role starting with `"assistant"` collapses to `"assistant"`, and the
/// prompt is appended as the final user message.
fn format_messages(history: &[HistoryTurn], prompt: &str) -> Vec<Value> {
    let mut messages: Vec<Value> = history
        .iter()
        .map(|t| {
            let role = if t.role.starts_with("assistant") {
                "assistant"
            } else {
                "user"
            };
            serde_json::json!({"role": role, "content": t.content})
        })
        .collect();
    messages.push(serde_json::json!({"role": "user", "content": prompt}));
    messages
}

/// Model-name normalization: `"haiku"` substring -> `claude-3-haiku`,
/// `"opus"` substring -> `claude-3-opus`, anything else -> `claude-3-sonnet`.
fn normalize_model(configured: &str) -> String {
    let lower = configured.to_lowercase();
    if lower.contains("haiku") {
        "claude-3-haiku".to_string()
    } else if lower.contains("opus") {
        "claude-3-opus".to_string()
    } else {
        "claude-3-sonnet".to_string()
    }
}

fn map_status_error(status: u16) -> String {
    match status {
        429 => "Rate limit exceeded".to_string(),
        400 => "Bad request".to_string(),
        401 => "Authentication failed".to_string(),
        other => format!("API error {other}"),
    }
}

#[async_trait::async_trait]
impl RawProvider for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate_response(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let messages = format_messages(&req.conversation_history, &req.prompt);
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
            "messages": messages,
        });

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Provider {
                provider: "anthropic".into(),
                message: map_status_error(status.as_u16()),
            });
        }

        let body: Value = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;

        let content = body
            .get("content")
            .and_then(|v| v.as_array())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let input_tokens = body
            .get("usage")
            .and_then(|u| u.get("input_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let output_tokens = body
            .get("usage")
            .and_then(|u| u.get("output_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        Ok(GenerateResponse {
            content,
            model: self.model.clone(),
            tokens: input_tokens + output_tokens,
            input_tokens,
            output_tokens,
            finish_reason: body
                .get("stop_reason")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/v1/messages", self.base_url);
        self.authed_post(&url)
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": 1,
                "messages": [{"role": "user", "content": "ping"}],
            }))
            .send()
            .await
            .is_ok()
    }
}
