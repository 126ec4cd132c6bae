//! `ResilientClient<P>` layers rate-limiting, circuit-breaking, and bounded
//! retry over a `RawProvider`. The flow is: rate-limit check, breaker
//! check, timed call, record success/failure, retry with exponential
//! backoff on transient errors.

use crate::resilience::{CircuitBreaker, RateLimiter};
use crate::traits::{GenerateRequest, GenerateResponse, RawProvider};
use orc_domain::config::{BreakerConfig, RateLimitConfig, RetryConfig};
use orc_domain::error::{Error, Result};
use orc_domain::telemetry::TraceEvent;
use std::time::{Duration, Instant};

pub struct ResilientClient<P: RawProvider> {
    inner: P,
    rate_limiter: RateLimiter,
    breaker: CircuitBreaker,
    retry: RetryConfig,
}

/// Errors considered transient and worth retrying: network/HTTP failures
/// and timeouts. Non-transient provider errors (bad request, auth
/// failure) are returned immediately without retrying.
fn is_retriable(err: &Error) -> bool {
    matches!(err, Error::Http(_) | Error::Timeout(_))
}

impl<P: RawProvider> ResilientClient<P> {
    pub fn new(inner: P, rate_limit: &RateLimitConfig, breaker: &BreakerConfig, retry: &RetryConfig) -> Self {
        Self {
            inner,
            rate_limiter: RateLimiter::new(
                rate_limit.requests_per_minute,
                Duration::from_secs(rate_limit.window_seconds),
            ),
            breaker: CircuitBreaker::new(
                breaker.failure_threshold,
                Duration::from_secs(breaker.timeout_seconds),
            ),
            retry: retry.clone(),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }

    pub async fn generate_response(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        if !self.rate_limiter.try_acquire() {
            TraceEvent::RateLimited {
                provider: self.inner.name().to_string(),
            }
            .emit();
            return Err(Error::RateLimited(self.inner.name().to_string()));
        }

        self.breaker
            .check()
            .map_err(|_| Error::CircuitOpen(self.inner.name().to_string()))?;

        let mut attempt = 0u32;
        loop {
            let started = Instant::now();
            match self.inner.generate_response(req).await {
                Ok(resp) => {
                    self.breaker.record_success();
                    TraceEvent::LlmRequest {
                        provider: self.inner.name().to_string(),
                        model: resp.model.clone(),
                        latency_ms: started.elapsed().as_millis() as u64,
                    }
                    .emit();
                    return Ok(resp);
                }
                Err(err) => {
                    self.breaker.record_failure();
                    attempt += 1;
                    if attempt >= self.retry.max_retries || !is_retriable(&err) {
                        return Err(err);
                    }
                    TraceEvent::LlmRetry {
                        provider: self.inner.name().to_string(),
                        attempt,
                    }
                    .emit();
                    let delay = (self.retry.retry_delay_seconds
                        * self.retry.exponential_base.powi(attempt as i32 - 1))
                    .min(10.0)
                    .max(1.0);
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyProvider {
        failures_then_success: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl RawProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate_response(&self, _req: &GenerateRequest) -> Result<GenerateResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_then_success {
                return Err(Error::Http("connection reset".into()));
            }
            Ok(GenerateResponse {
                content: "ok".into(),
                model: "test-model".into(),
                tokens: 10,
                input_tokens: 5,
                output_tokens: 5,
                finish_reason: Some("stop".into()),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn req() -> GenerateRequest {
        GenerateRequest {
            prompt: "hi".into(),
            conversation_history: vec![],
            max_tokens: 100,
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = FlakyProvider {
            failures_then_success: 2,
            calls: calls.clone(),
        };
        let client = ResilientClient::new(
            provider,
            &RateLimitConfig { requests_per_minute: 60, window_seconds: 60 },
            &BreakerConfig { failure_threshold: 10, timeout_seconds: 60 },
            &RetryConfig { max_retries: 3, retry_delay_seconds: 0.01, exponential_base: 1.0 },
        );
        let resp = client.generate_response(&req()).await.unwrap();
        assert_eq!(resp.content, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = FlakyProvider {
            failures_then_success: 99,
            calls: calls.clone(),
        };
        let client = ResilientClient::new(
            provider,
            &RateLimitConfig { requests_per_minute: 60, window_seconds: 60 },
            &BreakerConfig { failure_threshold: 10, timeout_seconds: 60 },
            &RetryConfig { max_retries: 3, retry_delay_seconds: 0.01, exponential_base: 1.0 },
        );
        assert!(client.generate_response(&req()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_rejects_beyond_window_capacity() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = FlakyProvider { failures_then_success: 0, calls: calls.clone() };
        let client = ResilientClient::new(
            provider,
            &RateLimitConfig { requests_per_minute: 1, window_seconds: 60 },
            &BreakerConfig { failure_threshold: 10, timeout_seconds: 60 },
            &RetryConfig { max_retries: 3, retry_delay_seconds: 0.01, exponential_base: 1.0 },
        );
        assert!(client.generate_response(&req()).await.is_ok());
        assert!(matches!(
            client.generate_response(&req()).await,
            Err(Error::RateLimited(_))
        ));
    }
}
