/// Shared error type used across all orchestrator crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("circuit breaker open for provider {0}")]
    CircuitOpen(String),

    #[error("rate limit exceeded for provider {0}")]
    RateLimited(String),

    #[error("store: {0}")]
    Store(String),

    #[error("bus: {0}")]
    Bus(String),

    #[error("lock not held: {0}")]
    LockNotHeld(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
