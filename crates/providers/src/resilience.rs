//! Sliding-window rate limiter and circuit breaker. Kept separate from the
//! provider-specific wire adapters so both providers share one policy
//! implementation, separating transport concerns from cross-cutting ones.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    timestamps: Mutex<Vec<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            window,
            max_requests,
            timestamps: Mutex::new(Vec::new()),
        }
    }

    /// Returns `true` if a request may proceed now, recording it if so.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Clock-injectable variant for deterministic tests.
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut timestamps = self.timestamps.lock();
        let window_start = now.checked_sub(self.window).unwrap_or(now);
        timestamps.retain(|&t| t > window_start);
        if timestamps.len() as u32 >= self.max_requests {
            return false;
        }
        timestamps.push(now);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

struct BreakerInner {
    failures: u32,
    last_failure: Option<Instant>,
    open: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("circuit breaker open")]
pub struct CircuitOpenError;

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                failures: 0,
                last_failure: None,
                open: false,
            }),
        }
    }

    /// Returns `Err` if the breaker is open and hasn't reached its reset
    /// timeout yet; auto-resets (half-open) otherwise.
    pub fn check(&self) -> Result<(), CircuitOpenError> {
        self.check_at(Instant::now())
    }

    pub fn check_at(&self, now: Instant) -> Result<(), CircuitOpenError> {
        let mut inner = self.inner.lock();
        if inner.open {
            if let Some(last) = inner.last_failure {
                if now.duration_since(last) > self.reset_timeout {
                    inner.open = false;
                    inner.failures = 0;
                    return Ok(());
                }
            }
            return Err(CircuitOpenError);
        }
        Ok(())
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.failures = 0;
        inner.open = false;
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        inner.failures += 1;
        inner.last_failure = Some(now);
        if inner.failures >= self.failure_threshold {
            inner.open = true;
        }
    }

    pub fn state(&self) -> BreakerState {
        if self.inner.lock().open {
            BreakerState::Open
        } else {
            BreakerState::Closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_up_to_max_within_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.try_acquire_at(t0));
        assert!(limiter.try_acquire_at(t0));
        assert!(!limiter.try_acquire_at(t0));
    }

    #[test]
    fn rate_limiter_prunes_expired_window() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.try_acquire_at(t0));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(30)));
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(61)));
    }

    #[test]
    fn breaker_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        let t0 = Instant::now();
        breaker.record_failure_at(t0);
        breaker.record_failure_at(t0);
        assert!(breaker.check_at(t0).is_ok());
        breaker.record_failure_at(t0);
        assert!(breaker.check_at(t0).is_err());
    }

    #[test]
    fn breaker_success_fully_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        let t0 = Instant::now();
        breaker.record_failure_at(t0);
        breaker.record_failure_at(t0);
        breaker.record_success();
        breaker.record_failure_at(t0);
        assert!(breaker.check_at(t0).is_ok());
    }

    #[test]
    fn breaker_auto_resets_after_timeout() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        let t0 = Instant::now();
        breaker.record_failure_at(t0);
        assert!(breaker.check_at(t0).is_err());
        assert!(breaker.check_at(t0 + Duration::from_secs(61)).is_ok());
    }
}
