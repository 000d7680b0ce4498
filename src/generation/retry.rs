//! Retry schedule for generation endpoint calls

use std::time::Duration;

/// Upper bound on attempts per `generate` call
pub const MAX_ATTEMPTS: u32 = 5;

/// Delay before the first retry
pub const INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Retry policy for the generation endpoint
///
/// Delays double after every backed-off attempt with no jitter and no cap,
/// so the default schedule is 1s, 2s, 4s, 8s, 16s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay applied after the first retryable failure
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_delay: INITIAL_DELAY,
        }
    }
}

/// How a single HTTP status should be treated by the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx: try to extract the generated text
    Success,
    /// 429: back off and retry
    RateLimited,
    /// 5xx: back off and retry
    ServerError,
    /// Anything else: abort without retrying
    Fatal,
}

/// Classify an HTTP status for the retry loop
#[must_use]
pub const fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        429 => StatusClass::RateLimited,
        500..=599 => StatusClass::ServerError,
        _ => StatusClass::Fatal,
    }
}

/// Delay to apply after the `backoff`-th retryable failure (zero-based)
///
/// The index counts backoffs actually applied, not attempts: an attempt that
/// is retried without waiting does not advance the schedule.
#[must_use]
pub fn delay_for_backoff(policy: &RetryPolicy, backoff: u32) -> Duration {
    policy
        .initial_delay
        .saturating_mul(2u32.saturating_pow(backoff))
}
