//! Provider call pacing and the sticky authentication gate.
//!
//! [`RateLimiter`] is a single global gate in front of the image provider.
//! It is not per-key: the provider is what gets rate-limited, not the
//! subject being drawn. Backoff grows as `min_delay * 1.5^failures`,
//! capped at `max_delay`, and is measured from the start of the previous
//! attempt.
//!
//! An authentication failure flips `provider_authenticated` to false. Time
//! does not clear it; only [`RateLimiter::reset_auth()`] or
//! [`RateLimiter::reset()`] does.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Growth factor applied per consecutive failure.
const BACKOFF_FACTOR: f64 = 1.5;

/// Backoff bounds for the provider gate.
///
/// ```rust
/// # use visage::RateLimitConfig;
/// # use std::time::Duration;
/// let config = RateLimitConfig::new()
///     .min_delay(Duration::from_millis(500))
///     .max_delay(Duration::from_secs(5));
/// assert_eq!(config.delay_for_failures(0), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Floor for backoff; also the minimum spacing between calls. Default: 1.5s.
    pub min_delay: Duration,
    /// Ceiling for backoff. Default: 10s.
    pub max_delay: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(1500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RateLimitConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backoff floor.
    pub fn min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    /// Set the backoff ceiling.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Required spacing after `failures` consecutive failures.
    ///
    /// `min(max_delay, min_delay * 1.5^failures)`. Saturates at `max_delay`
    /// instead of overflowing for large failure counts.
    pub fn delay_for_failures(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures).unwrap_or(i32::MAX);
        let secs = self.min_delay.as_secs_f64() * BACKOFF_FACTOR.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Snapshot of the limiter's mutable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitState {
    /// Start of the most recent provider attempt, if any.
    pub last_request_at: Option<Instant>,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// False once the provider has rejected our credentials.
    pub provider_authenticated: bool,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self {
            last_request_at: None,
            consecutive_failures: 0,
            provider_authenticated: true,
        }
    }
}

/// Process-wide pacing gate for provider calls.
///
/// All state lives behind one mutex so the read-modify-write of
/// `consecutive_failures` and `last_request_at` never loses updates under
/// concurrent callers.
#[derive(Debug, Default)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<RateLimitState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RateLimitState::default()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, RateLimitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_at(&self, state: &RateLimitState, now: Instant) -> Duration {
        let Some(last) = state.last_request_at else {
            return Duration::ZERO;
        };
        // `last` can sit in the future when a slot was reserved ahead.
        let next_allowed = last + self.config.delay_for_failures(state.consecutive_failures);
        next_allowed.saturating_duration_since(now)
    }

    /// How long a caller should wait before the next provider attempt.
    ///
    /// Zero when no attempt has been made yet.
    pub fn should_wait(&self) -> Duration {
        let state = self.lock();
        self.wait_at(&state, Instant::now())
    }

    /// Mark the start of a provider attempt.
    ///
    /// Called before the request goes out, so a slow call still holds off
    /// concurrent callers.
    pub fn record_attempt_start(&self) {
        self.lock().last_request_at = Some(Instant::now());
    }

    /// Compute the wait and claim the next slot in one step.
    ///
    /// Stamps `last_request_at` with the moment the caller will actually
    /// start (now + wait), so a second caller arriving in between sees the
    /// slot as taken and queues behind it instead of also getting zero.
    pub fn reserve_slot(&self) -> Duration {
        let mut state = self.lock();
        let now = Instant::now();
        let wait = self.wait_at(&state, now);
        state.last_request_at = Some(now + wait);
        wait
    }

    /// Reset the failure streak after a successful call.
    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    /// Count a failed call. Auth failures also disable the provider.
    pub fn record_failure(&self, is_auth_failure: bool) {
        let mut state = self.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if is_auth_failure {
            state.provider_authenticated = false;
        }
    }

    /// Whether the provider may be called at all.
    pub fn is_provider_usable(&self) -> bool {
        self.lock().provider_authenticated
    }

    /// Clear the sticky auth failure (e.g. after rotating the API key).
    pub fn reset_auth(&self) {
        self.lock().provider_authenticated = true;
    }

    /// Clear backoff counters and call history. Leaves the auth flag alone.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.consecutive_failures = 0;
        state.last_request_at = None;
    }

    /// Current state snapshot.
    pub fn state(&self) -> RateLimitState {
        self.lock().clone()
    }
}
