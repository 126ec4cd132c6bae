//! Google Gemini `generateContent` adapter.
//!
//! Wire format, safety settings, and error mapping match the Gemini REST
//! API precisely; request construction follows the same shape as
//! `AnthropicClient`.

use crate::traits::{GenerateRequest, GenerateResponse, HistoryTurn, RawProvider};
use orc_domain::config::ProviderConfig;
use orc_domain::error::{Error, Result};
use serde_json::Value;

const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GoogleClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GoogleClient {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: if cfg.model.is_empty() {
                "gemini-pro".to_string()
            } else {
                cfg.model.clone()
            },
            client,
        })
    }
}

/// Assistant-prefixed roles map to `"model"`, `"system"` maps to `"user"`
/// (Gemini has no system turn in the basic contents array).
fn format_contents(history: &[HistoryTurn], prompt: &str) -> Vec<Value> {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|t| {
            let role = if t.role.starts_with("assistant") {
                "model"
            } else {
                "user"
            };
            serde_json::json!({"role": role, "parts": [{"text": t.content}]})
        })
        .collect();
    contents.push(serde_json::json!({"role": "user", "parts": [{"text": prompt}]}));
    contents
}

fn safety_settings() -> Value {
    serde_json::json!(SAFETY_CATEGORIES
        .iter()
        .map(|cat| serde_json::json!({"category": cat, "threshold": "BLOCK_MEDIUM_AND_ABOVE"}))
        .collect::<Vec<_>>())
}

fn map_status_error(status: u16, body: &Value) -> String {
    let code_429 = body
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_u64())
        == Some(429);
    if status == 429 || code_429 {
        "Quota exceeded".to_string()
    } else if status == 400 {
        "Bad request".to_string()
    } else if status == 403 {
        "Permission denied".to_string()
    } else {
        format!("API error {status}")
    }
}

#[async_trait::async_trait]
impl RawProvider for GoogleClient {
    fn name(&self) -> &str {
        "google"
    }

    async fn generate_response(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = serde_json::json!({
            "contents": format_contents(&req.conversation_history, &req.prompt),
            "generationConfig": {
                "temperature": req.temperature,
                "maxOutputTokens": req.max_tokens,
                "topP": 0.95,
                "topK": 40,
            },
            "safetySettings": safety_settings(),
        });

        let resp = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let resp_json: Value = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: "google".into(),
                message: map_status_error(status.as_u16(), &resp_json),
            });
        }

        let candidates = resp_json
            .get("candidates")
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default();
        if candidates.is_empty() {
            return Err(Error::Provider {
                provider: "google".into(),
                message: "No candidates returned from API".into(),
            });
        }
        let candidate = &candidates[0];

        if candidate.get("finishReason").and_then(|v| v.as_str()) == Some("SAFETY") {
            let blocked: Vec<String> = candidate
                .get("safetyRatings")
                .and_then(|r| r.as_array())
                .map(|ratings| {
                    ratings
                        .iter()
                        .filter(|r| {
                            matches!(
                                r.get("probability").and_then(|p| p.as_str()),
                                Some("HIGH") | Some("MEDIUM")
                            )
                        })
                        .filter_map(|r| r.get("category").and_then(|c| c.as_str()))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            return Err(Error::Provider {
                provider: "google".into(),
                message: format!("Response blocked by safety filter: {}", blocked.join(", ")),
            });
        }

        let content = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if content.is_empty() {
            return Err(Error::Provider {
                provider: "google".into(),
                message: "Empty response from API".into(),
            });
        }

        let usage = resp_json.get("usageMetadata");
        let prompt_tokens = usage
            .and_then(|u| u.get("promptTokenCount"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let candidates_tokens = usage
            .and_then(|u| u.get("candidatesTokenCount"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let total_tokens = usage
            .and_then(|u| u.get("totalTokenCount"))
            .and_then(|v| v.as_u64())
            .unwrap_or(prompt_tokens + candidates_tokens);

        Ok(GenerateResponse {
            content,
            model: "gemini-pro".to_string(),
            tokens: total_tokens,
            input_tokens: prompt_tokens,
            output_tokens: candidates_tokens,
            finish_reason: candidate
                .get("finishReason")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        self.client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "ping"}]}],
            }))
            .send()
            .await
            .is_ok()
    }
}
