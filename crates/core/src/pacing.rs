//! Request pacing and retry for the rate-limited Discogs API.
//!
//! Every remote call, from any worker, goes through one shared
//! [`RequestPacer`]. It spaces calls by a minimum interval and holds a shared
//! back-off deadline that a throttled response pushes forward, so one 429
//! slows down every worker rather than just the one that saw it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::discogs::ServiceError;

#[derive(Debug, Default)]
struct PacerState {
    last_granted: Option<Instant>,
    backoff_until: Option<Instant>,
}

/// Snapshot of pacer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacerStats {
    /// Request slots handed out.
    pub granted: u64,
    /// Throttle back-offs applied.
    pub back_offs: u64,
}

/// Shared pacing state for all remote calls.
pub struct RequestPacer {
    min_interval: Duration,
    state: Mutex<PacerState>,
    granted: AtomicU64,
    back_offs: AtomicU64,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(PacerState::default()),
            granted: AtomicU64::new(0),
            back_offs: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.min_interval())
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for a request slot and claim it.
    ///
    /// The lock is never held across a sleep. After each wake-up the caller
    /// re-reads the interval and back-off deadline, so a back-off recorded
    /// while it waited still applies, and the slot is only claimed under the
    /// lock once nothing pushes it further out.
    pub async fn acquire(&self) {
        loop {
            let now = Instant::now();
            let ready_at = {
                let mut state = self.lock_state();
                let ready_at = self.ready_at(&state, now);
                if ready_at <= now {
                    state.last_granted = Some(now);
                    self.granted.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                ready_at
            };

            debug!("Rate limit: waiting {:?}", ready_at - now);
            sleep_until(ready_at).await;
        }
    }

    /// Hold every caller back for at least `delay` from now.
    ///
    /// An existing later deadline is kept. Callers already waiting in
    /// [`acquire`](Self::acquire) pick the deadline up when they wake.
    pub fn back_off(&self, delay: Duration) {
        let mut state = self.lock_state();
        let until = Instant::now() + delay;
        state.backoff_until = Some(match state.backoff_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
        self.back_offs.fetch_add(1, Ordering::Relaxed);
    }

    fn ready_at(&self, state: &PacerState, now: Instant) -> Instant {
        let mut ready_at = now;
        if let Some(last) = state.last_granted {
            ready_at = ready_at.max(last + self.min_interval);
        }
        if let Some(until) = state.backoff_until {
            ready_at = ready_at.max(until);
        }
        ready_at
    }

    fn lock_state(&self) -> MutexGuard<'_, PacerState> {
        // the state is two timestamps; a panicked holder cannot leave it torn
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> PacerStats {
        PacerStats {
            granted: self.granted.load(Ordering::Relaxed),
            back_offs: self.back_offs.load(Ordering::Relaxed),
        }
    }
}

/// Bounded retry with exponential back-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before retrying after failed attempt number `attempt` (1-based).
    ///
    /// A server-specified delay wins over the exponential schedule; both are
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = retry_after.unwrap_or_else(|| {
            let exponent = attempt.saturating_sub(1).min(16);
            self.base_delay.saturating_mul(1u32 << exponent)
        });
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

/// Run `call` through the pacer, retrying throttled and transient failures.
///
/// Returns the last error once attempts run out or the error is not retryable.
pub async fn call_with_retry<T, F, Fut>(
    pacer: &RequestPacer,
    policy: &RetryPolicy,
    what: &str,
    mut call: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt = 1;
    loop {
        pacer.acquire().await;

        let error = match call().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_retryable() || attempt >= policy.max_attempts {
            if error.is_retryable() {
                warn!("{}: giving up after {} attempts: {}", what, attempt, error);
            }
            return Err(error);
        }

        let delay = policy.delay_for(attempt, error.retry_after());
        match &error {
            ServiceError::Throttled { .. } => {
                warn!(
                    "{}: throttled (attempt {}/{}), backing off {:?}",
                    what, attempt, policy.max_attempts, delay
                );
                pacer.back_off(delay);
            }
            _ => {
                debug!(
                    "{}: transient failure (attempt {}/{}): {}; retrying in {:?}",
                    what, attempt, policy.max_attempts, error, delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        attempt += 1;
    }
}
