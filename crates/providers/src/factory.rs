//! Caches one resilient client per provider.

use crate::anthropic::AnthropicClient;
use crate::client::ResilientClient;
use crate::google::GoogleClient;
use orc_domain::config::Config;
use orc_domain::error::Result;

pub struct LlmClientFactory {
    pub anthropic: ResilientClient<AnthropicClient>,
    pub google: ResilientClient<GoogleClient>,
}

impl LlmClientFactory {
    pub fn from_config(config: &Config) -> Result<Self> {
        let anthropic = ResilientClient::new(
            AnthropicClient::from_config(&config.anthropic)?,
            &config.rate_limit,
            &config.breaker,
            &config.retry,
        );
        let google = ResilientClient::new(
            GoogleClient::from_config(&config.google)?,
            &config.rate_limit,
            &config.breaker,
            &config.retry,
        );
        Ok(Self { anthropic, google })
    }

    /// `idx % 2` selection, alternating turns between the two configured
    /// providers.
    pub fn by_index(&self, idx: usize) -> &str {
        if idx % 2 == 0 { "anthropic" } else { "google" }
    }

    pub async fn health_check_all(&self) -> Vec<(String, bool)> {
        vec![
            ("anthropic".to_string(), self.anthropic.health_check().await),
            ("google".to_string(), self.google.health_check().await),
        ]
    }
}
