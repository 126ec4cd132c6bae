//! Typed, env-driven configuration, constructed once at process start.
//!
//! A plain struct with an explicit `from_env()` constructor rather than a
//! dynamic settings object.

use crate::error::{Error, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub bus: BusConfig,
    pub anthropic: ProviderConfig,
    pub google: ProviderConfig,
    pub conversation: ConversationConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub breaker: BreakerConfig,
    pub app: AppConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Build configuration from the process environment.
    ///
    /// Fails fast if a required provider API key is missing.
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            store: StoreConfig::from_env(),
            bus: BusConfig::from_env(),
            anthropic: ProviderConfig::from_env(
                "ANTHROPIC_API_KEY",
                "ANTHROPIC_MODEL",
                "claude-3-sonnet-20240229",
            )?,
            google: ProviderConfig::from_env(
                "GOOGLE_API_KEY",
                "GOOGLE_MODEL",
                "gemini-pro",
            )?,
            conversation: ConversationConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            retry: RetryConfig::from_env(),
            breaker: BreakerConfig::from_env(),
            app: AppConfig::from_env(),
            logging: LoggingConfig::from_env(),
        };
        Ok(cfg)
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    pub conversation_ttl_seconds: u64,
}

impl StoreConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("REDIS_HOST", "localhost"),
            port: env_parse_or("REDIS_PORT", 6379),
            password: env::var("REDIS_PASSWORD").ok(),
            db: env_parse_or("REDIS_DB", 0),
            conversation_ttl_seconds: env_parse_or("CONVERSATION_TTL_SECONDS", 86_400),
        }
    }

    /// `redis://[:password@]host:port/db`
    pub fn url(&self) -> String {
        match &self.password {
            Some(p) if !p.is_empty() => {
                format!("redis://:{}@{}:{}/{}", p, self.host, self.port, self.db)
            }
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub bootstrap_servers: String,
    pub consumer_group_id: String,
    pub auto_offset_reset: String,
    pub enable_auto_commit: bool,
    pub topic_conversation_new: String,
    pub topic_conversation_turn: String,
    pub topic_conversation_response: String,
    pub topic_conversation_completed: String,
    pub topic_conversation_error: String,
    pub max_retries: u32,
    pub retry_delay_seconds: f64,
}

impl BusConfig {
    fn from_env() -> Self {
        Self {
            bootstrap_servers: env_or("KAFKA_BOOTSTRAP_SERVERS", "localhost:9092"),
            consumer_group_id: env_or("KAFKA_CONSUMER_GROUP_ID", "orchestration-service"),
            auto_offset_reset: env_or("KAFKA_AUTO_OFFSET_RESET", "latest"),
            enable_auto_commit: env_parse_or("KAFKA_ENABLE_AUTO_COMMIT", false),
            topic_conversation_new: env_or("TOPIC_CONVERSATION_NEW", "conversation.new"),
            topic_conversation_turn: env_or("TOPIC_CONVERSATION_TURN", "conversation.turn"),
            topic_conversation_response: env_or(
                "TOPIC_CONVERSATION_RESPONSE",
                "conversation.response",
            ),
            topic_conversation_completed: env_or(
                "TOPIC_CONVERSATION_COMPLETED",
                "conversation.completed",
            ),
            topic_conversation_error: env_or("TOPIC_CONVERSATION_ERROR", "conversation.error"),
            max_retries: env_parse_or("MAX_RETRIES", 3),
            retry_delay_seconds: env_parse_or("RETRY_DELAY_SECONDS", 1.0),
        }
    }

    pub fn bootstrap_servers_list(&self) -> Vec<String> {
        self.bootstrap_servers
            .split(',')
            .map(|s| s.trim().to_string())
            .collect()
    }

    pub fn dlq_topic(topic: &str) -> String {
        format!("{topic}.dlq")
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ProviderConfig {
    fn from_env(key_var: &str, model_var: &str, default_model: &str) -> Result<Self> {
        let api_key = env::var(key_var)
            .map_err(|_| Error::Config(format!("missing required environment variable: {key_var}")))?;
        if api_key.is_empty() {
            return Err(Error::Config(format!(
                "missing required environment variable: {key_var}"
            )));
        }
        Ok(Self {
            api_key,
            model: env_or(model_var, default_model),
            base_url: match key_var {
                "ANTHROPIC_API_KEY" => env_or("ANTHROPIC_BASE_URL", "https://api.anthropic.com"),
                _ => env_or("GOOGLE_BASE_URL", "https://generativelanguage.googleapis.com/v1"),
            },
            max_tokens: 2048,
            temperature: 0.7,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub max_turns: usize,
    pub min_turns: usize,
    pub timeout_seconds: u64,
    pub max_concurrent: usize,
}

impl ConversationConfig {
    fn from_env() -> Self {
        Self {
            max_turns: env_parse_or("MAX_CONVERSATION_TURNS", 10),
            min_turns: env_parse_or("MIN_CONVERSATION_TURNS", 5),
            timeout_seconds: env_parse_or("CONVERSATION_TIMEOUT_SECONDS", 300),
            max_concurrent: env_parse_or("MAX_CONCURRENT_CONVERSATIONS", 100),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub window_seconds: u64,
}

impl RateLimitConfig {
    fn from_env() -> Self {
        Self {
            requests_per_minute: env_parse_or("RATE_LIMIT_REQUESTS_PER_MINUTE", 60),
            window_seconds: env_parse_or("RATE_LIMIT_WINDOW_SECONDS", 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_seconds: f64,
    pub exponential_base: f64,
}

impl RetryConfig {
    fn from_env() -> Self {
        Self {
            max_retries: env_parse_or("MAX_RETRIES", 3),
            retry_delay_seconds: env_parse_or("RETRY_DELAY_SECONDS", 1.0),
            exponential_base: env_parse_or("RETRY_EXPONENTIAL_BASE", 2.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl BreakerConfig {
    fn from_env() -> Self {
        Self {
            failure_threshold: env_parse_or("CIRCUIT_BREAKER_FAILURE_THRESHOLD", 5),
            timeout_seconds: env_parse_or("CIRCUIT_BREAKER_TIMEOUT_SECONDS", 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    pub debug: bool,
    pub log_level: String,
}

impl AppConfig {
    fn from_env() -> Self {
        Self {
            name: env_or("APP_NAME", "orchestration-service"),
            version: env_or("APP_VERSION", "1.0.0"),
            debug: env_parse_or("DEBUG", false),
            log_level: env_or("LOG_LEVEL", "info"),
        }
    }
}

/// Ambient logging bootstrap config — not part of the distilled feature
/// set, but every worker configures this explicitly at startup.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl LoggingConfig {
    fn from_env() -> Self {
        Self {
            level: env_or("LOG_LEVEL", "info"),
            json: env_parse_or("LOG_JSON", true),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_url_without_password() {
        let cfg = StoreConfig {
            host: "localhost".into(),
            port: 6379,
            password: None,
            db: 0,
            conversation_ttl_seconds: 86_400,
        };
        assert_eq!(cfg.url(), "redis://localhost:6379/0");
    }

    #[test]
    fn store_url_with_password() {
        let cfg = StoreConfig {
            host: "redis.internal".into(),
            port: 6380,
            password: Some("secret".into()),
            db: 2,
            conversation_ttl_seconds: 86_400,
        };
        assert_eq!(cfg.url(), "redis://:secret@redis.internal:6380/2");
    }

    #[test]
    fn bus_bootstrap_servers_list_splits_and_trims() {
        let cfg = BusConfig {
            bootstrap_servers: "host1:9092, host2:9092 ,host3:9092".into(),
            consumer_group_id: "g".into(),
            auto_offset_reset: "latest".into(),
            enable_auto_commit: false,
            topic_conversation_new: "conversation.new".into(),
            topic_conversation_turn: "conversation.turn".into(),
            topic_conversation_response: "conversation.response".into(),
            topic_conversation_completed: "conversation.completed".into(),
            topic_conversation_error: "conversation.error".into(),
            max_retries: 3,
            retry_delay_seconds: 1.0,
        };
        assert_eq!(
            cfg.bootstrap_servers_list(),
            vec!["host1:9092", "host2:9092", "host3:9092"]
        );
    }

    #[test]
    fn dlq_topic_name() {
        assert_eq!(BusConfig::dlq_topic("conversation.turn"), "conversation.turn.dlq");
    }

    #[test]
    fn logging_config_defaults_to_info_and_json() {
        std::env::remove_var("LOG_LEVEL");
        std::env::remove_var("LOG_JSON");
        let cfg = LoggingConfig::from_env();
        assert_eq!(cfg.level, "info");
        assert!(cfg.json);
    }
}
