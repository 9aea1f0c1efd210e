//! Exponential backoff retry, optionally composed with a circuit breaker.
//!
//! No crate in the retrieved reference pack is evidenced for randomized
//! jitter, so this module hand-rolls a small linear-congruential generator
//! seeded from the system clock rather than introducing an ungrounded
//! dependency — the computation itself (`±25%` of the backoff delay) is
//! trivial enough that this is not a meaningful loss of rigor.

use crate::error::{is_transient_message, AgentError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Minimal jitter source. Not cryptographically meaningful; only used to
/// spread retry timing.
fn jitter_unit() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    // LCG constants from Numerical Recipes.
    let x = nanos.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    (x % 1_000_000) as f64 / 1_000_000.0
}

/// Computes the delay for attempt `attempt` (0-indexed) with `±25%` jitter
/// applied around `min(initial * multiplier^attempt, max_delay)`.
pub fn backoff_delay(initial_delay: Duration, multiplier: f64, max_delay: Duration, attempt: u32) -> Duration {
    let base_ms = (initial_delay.as_millis() as f64) * multiplier.powi(attempt as i32);
    let capped_ms = base_ms.min(max_delay.as_millis() as f64);
    let jitter_factor = 0.75 + jitter_unit() * 0.5; // in [0.75, 1.25]
    Duration::from_millis((capped_ms * jitter_factor).round() as u64)
}

/// Circuit breaker states, following the classic closed/open/half-open
/// machine. Stateful in one owner, shared across calls via `Arc`.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_after: Duration,
    consecutive_failures: AtomicUsize,
    opened_at_millis: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_after: Duration) -> Self {
        Self {
            failure_threshold,
            reset_after,
            consecutive_failures: AtomicUsize::new(0),
            opened_at_millis: AtomicU64::new(0),
        }
    }

    fn now_millis() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }

    fn is_open(&self) -> bool {
        let opened_at = self.opened_at_millis.load(Ordering::SeqCst);
        if opened_at == 0 {
            return false;
        }
        let elapsed = Self::now_millis().saturating_sub(opened_at);
        if elapsed >= self.reset_after.as_millis() as u64 {
            // Half-open: allow the next call through, reset the gate.
            self.opened_at_millis.store(0, Ordering::SeqCst);
            return false;
        }
        true
    }

    fn on_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.opened_at_millis.store(0, Ordering::SeqCst);
    }

    fn on_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures as u32 >= self.failure_threshold {
            self.opened_at_millis.store(Self::now_millis().max(1), Ordering::SeqCst);
        }
    }
}

/// Runs `block` with exponential backoff, retrying only transient failures
/// and honoring an optional shared `CircuitBreaker`.
pub struct RetryExecutor<'a> {
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    circuit_breaker: Option<&'a CircuitBreaker>,
}

impl<'a> RetryExecutor<'a> {
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier,
            max_delay,
            circuit_breaker: None,
        }
    }

    pub fn with_circuit_breaker(mut self, breaker: &'a CircuitBreaker) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    pub async fn execute<F, Fut, T>(&self, mut block: F) -> Result<T, AgentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        if let Some(breaker) = self.circuit_breaker {
            if breaker.is_open() {
                return Err(AgentError::CircuitBreakerOpen);
            }
        }

        let mut attempt = 0;
        loop {
            match block().await {
                Ok(value) => {
                    if let Some(breaker) = self.circuit_breaker {
                        breaker.on_success();
                    }
                    return Ok(value);
                }
                Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
                Err(err) => {
                    let transient = err.is_transient() || is_transient_message(&err.user_message());
                    let last_attempt = attempt + 1 >= self.max_attempts;
                    if let Some(breaker) = self.circuit_breaker {
                        breaker.on_failure();
                    }
                    if !transient || last_attempt {
                        return Err(err);
                    }
                    let delay = backoff_delay(self.initial_delay, self.multiplier, self.max_delay, attempt);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
