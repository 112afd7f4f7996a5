//! Deterministic backoff policy
//!
//! One policy type covers both connection profiles: the unbounded profile used
//! while establishing the first connection, and the bounded profile used to
//! reconnect after a failed flush. Delays grow geometrically from `min_delay`
//! by `factor` and are capped at `max_delay`. There is no jitter.

use std::time::Duration;

/// Default startup profile: retry forever, once per second
pub const DEFAULT_STARTUP_FACTOR: f64 = 1.0;

/// Default reconnect profile: three checks
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;

/// Default reconnect growth factor
pub const DEFAULT_RECONNECT_FACTOR: f64 = 3.0;

/// Default first delay
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);

/// Default delay cap
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Where a controller run stands after a failed health check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    /// Checks made so far in this run
    pub count: u32,
    /// Wait before the next check
    pub next_delay: Duration,
}

/// Parameterized backoff shared by the startup and reconnect paths
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Total checks allowed (`None` = retry forever)
    pub max_attempts: Option<u32>,
    /// Growth factor between consecutive delays (1.0 = fixed delay)
    pub factor: f64,
    /// First delay
    pub min_delay: Duration,
    /// Delay cap
    pub max_delay: Duration,
}

impl BackoffPolicy {
    /// Policy that retries forever
    pub fn unbounded(factor: f64, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: None,
            factor,
            min_delay,
            max_delay,
        }
    }

    /// Policy that gives up after `max_attempts` checks
    pub fn bounded(max_attempts: u32, factor: f64, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            factor,
            min_delay,
            max_delay,
        }
    }

    /// Default profile for the first connection
    pub fn startup() -> Self {
        Self::unbounded(DEFAULT_STARTUP_FACTOR, DEFAULT_MIN_DELAY, DEFAULT_MAX_DELAY)
    }

    /// Default profile for reconnecting after a failed flush
    pub fn reconnect() -> Self {
        Self::bounded(
            DEFAULT_RECONNECT_ATTEMPTS,
            DEFAULT_RECONNECT_FACTOR,
            DEFAULT_MIN_DELAY,
            DEFAULT_MAX_DELAY,
        )
    }

    /// Whether this policy eventually gives up
    #[inline]
    pub fn is_bounded(&self) -> bool {
        self.max_attempts.is_some()
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.min(64) as i32;
        let scaled = self.min_delay.as_secs_f64() * self.factor.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Decide what happens after `failed` checks have failed
    ///
    /// Returns `None` once the attempt budget is spent.
    pub fn after_failure(&self, failed: u32) -> Option<RetryAttempt> {
        if let Some(max) = self.max_attempts
            && failed >= max
        {
            return None;
        }

        Some(RetryAttempt {
            count: failed,
            next_delay: self.delay(failed.saturating_sub(1)),
        })
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::startup()
    }
}
