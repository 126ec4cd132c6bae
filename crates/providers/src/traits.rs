//! Provider-agnostic request/response shapes and the raw transport trait.
//!
//! `RawProvider` implementations only know the wire format of one backend.
//! Retry, rate-limiting, and circuit-breaker policy live one layer up in
//! `ResilientClient`, keeping transport adapters separate from
//! cross-cutting policy.

use orc_domain::Result;

/// A single prior turn, expressed generically for the provider's
/// `conversation_history` parameter.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub conversation_history: Vec<HistoryTurn>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub model: String,
    pub tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub finish_reason: Option<String>,
}

#[async_trait::async_trait]
pub trait RawProvider: Send + Sync {
    /// Provider identifier, e.g. `"anthropic"` or `"google"`.
    fn name(&self) -> &str;

    async fn generate_response(&self, req: &GenerateRequest) -> Result<GenerateResponse>;

    /// Lightweight reachability probe.
    async fn health_check(&self) -> bool;
}
