//! Retry policy + circuit breaker wrapping every database call (§4.4, C4).
//!
//! Breaker state transitions are serialized by a single `std::sync::Mutex`
//! (§4.4 "Ordering and concurrency") — a blocking mutex is correct here
//! because the whole pipeline runs on a single-threaded current-thread
//! runtime (§5) and critical sections never cross an `.await`.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use export_core::ExportError;
use rand::Rng;

/// `retry_delay_ms * 2^attempt`, clamped at `max_retry_delay_ms`, plus
/// uniform jitter in `[0, delay/4]` (§4.4, testable property 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl RetryPolicy {
    fn base_delay(&self, attempt: u32) -> Duration {
        let exp = self.retry_delay_ms.saturating_mul(1u64 << attempt.min(32));
        Duration::from_millis(exp.min(self.max_retry_delay_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerInner {
    state: BreakerState,
    opened_until: Option<Instant>,
    consecutive_failures: u32,
    half_open_successes: u32,
}

/// Closed / Open(until) / HalfOpen state machine (§4.4). `threshold`
/// consecutive failures opens the breaker for `open_duration`; after it
/// expires, `required_successes` consecutive successes in HalfOpen close
/// it again, while any HalfOpen failure re-opens immediately.
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    threshold: u32,
    open_duration: Duration,
    required_successes: u32,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, open_duration: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                opened_until: None,
                consecutive_failures: 0,
                half_open_successes: 0,
            }),
            threshold,
            open_duration,
            required_successes: 3,
        }
    }

    /// Pre-check run inside the same critical section as the call itself
    /// (§4.4). Transitions Open -> HalfOpen once the cooldown has elapsed.
    fn check(&self) -> Result<(), ExportError> {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        if inner.state == BreakerState::Open {
            let until = inner.opened_until.expect("Open state always carries a deadline");
            if Instant::now() >= until {
                inner.state = BreakerState::HalfOpen;
                inner.half_open_successes = 0;
            } else {
                return Err(ExportError::CircuitOpen("breaker open, short-circuiting without contacting the database".into()));
            }
        }
        Ok(())
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.required_successes {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.opened_until = None;
                }
            }
            BreakerState::Closed => inner.consecutive_failures = 0,
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_until = Some(Instant::now() + self.open_duration);
                inner.half_open_successes = 0;
            }
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_until = Some(Instant::now() + self.open_duration);
                }
            }
            BreakerState::Open => {}
        }
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, BreakerState::Open)
    }
}

/// Combines a [`RetryPolicy`] with a [`CircuitBreaker`] to wrap every call
/// C5 makes through [`crate::GraphSource`].
pub struct RetryExecutor {
    policy: RetryPolicy,
    breaker: CircuitBreaker,
    call_timeout: Option<Duration>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, breaker_threshold: u32, breaker_open_duration: Duration) -> Self {
        Self { policy, breaker: CircuitBreaker::new(breaker_threshold, breaker_open_duration), call_timeout: None }
    }

    /// Applies `query_timeout_seconds` (§6) as a per-attempt deadline: each
    /// individual database call (not the whole retry loop) is bounded by
    /// this duration, and a timed-out attempt is classified the same as a
    /// `Timeout` failure for retry/breaker purposes.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Run `f` with retry + breaker semantics. `op_name` only labels the
    /// single consolidated give-up log line (§4.4: intermediate attempts
    /// are never individually logged).
    pub async fn call<F, Fut, T>(&self, op_name: &str, f: F) -> Result<T, ExportError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ExportError>>,
    {
        self.breaker.check()?;

        let mut first_failure: Option<String> = None;
        let mut total_delay = Duration::ZERO;

        for attempt in 0..=self.policy.max_retries {
            let attempt_result = match self.call_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, f()).await {
                    Ok(result) => result,
                    Err(_) => Err(ExportError::Timeout(format!("{op_name} exceeded query_timeout_seconds"))),
                },
                None => f().await,
            };
            match attempt_result {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(err) => {
                    self.breaker.record_failure();
                    let retryable = err.is_retryable();
                    let is_last_attempt = attempt == self.policy.max_retries;
                    if first_failure.is_none() {
                        first_failure = Some(err.to_string());
                    }
                    if !retryable || is_last_attempt {
                        tracing::warn!(
                            op = op_name,
                            first_failure = first_failure.as_deref().unwrap_or(""),
                            last_failure = %err,
                            total_delay_ms = total_delay.as_millis() as u64,
                            attempts = attempt + 1,
                            "giving up after retries exhausted"
                        );
                        return Err(err);
                    }
                    let delay = jittered_delay(self.policy.base_delay(attempt));
                    total_delay += delay;
                    tokio::time::sleep(delay).await;
                }
            }
        }
        unreachable!("loop always returns by the last attempt")
    }
}

fn jittered_delay(base: Duration) -> Duration {
    let jitter_max = base / 4;
    if jitter_max.is_zero() {
        return base;
    }
    let jitter_ms = rand::thread_rng().gen_range(0..=jitter_max.as_millis() as u64);
    base + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy { max_retries: 3, retry_delay_ms: 1, max_retry_delay_ms: 5 }
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_succeeds() {
        let exec = RetryExecutor::new(fast_policy(), 5, Duration::from_millis(10));
        let calls = Cell::new(0);
        let result = exec
            .call("probe", || {
                calls.set(calls.get() + 1);
                async { Ok::<_, ExportError>(42) }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures_up_to_max_retries() {
        let exec = RetryExecutor::new(fast_policy(), 10, Duration::from_millis(10));
        let calls = Cell::new(0);
        let result = exec
            .call("probe", || {
                let n = calls.get();
                calls.set(n + 1);
                async move {
                    if n < 3 {
                        Err(ExportError::Connection("transient".into()))
                    } else {
                        Ok(99)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test]
    async fn non_retryable_failure_propagates_immediately() {
        let exec = RetryExecutor::new(fast_policy(), 10, Duration::from_millis(10));
        let calls = Cell::new(0);
        let result: Result<i32, _> = exec
            .call("probe", || {
                calls.set(calls.get() + 1);
                async { Err(ExportError::Configuration("bad value".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_consecutive_failures() {
        let exec = RetryExecutor::new(RetryPolicy { max_retries: 0, retry_delay_ms: 1, max_retry_delay_ms: 5 }, 2, Duration::from_secs(60));
        for _ in 0..2 {
            let _ = exec.call("probe", || async { Err::<(), _>(ExportError::Connection("x".into())) }).await;
        }
        assert!(exec.breaker.is_open());
        let result = exec.call("probe", || async { Ok::<_, ExportError>(()) }).await;
        assert!(matches!(result, Err(ExportError::CircuitOpen(_))));
    }
}
