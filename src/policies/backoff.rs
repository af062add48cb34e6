//! # Backoff policy for reconnecting a stream.
//!
//! [`BackoffPolicy`] maps the per-root attempt counter to the delay before the
//! next connection attempt. It is parameterized by:
//! - [`BackoffPolicy::first`] the delay before the first retry;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the ceiling.
//!
//! The counter passed in is the value **after** it was incremented for the
//! failure being handled, so the first retry asks for `next(1)`:
//! `delay(n) = first × factor^(n-1)`, clamped to `max`, then jittered.
//! The policy is stateless; the counter itself lives in the supervisor.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use streamvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::sse();
//!
//! assert_eq!(backoff.next(1), Duration::from_millis(500));
//! assert_eq!(backoff.next(2), Duration::from_millis(1000));
//! assert_eq!(backoff.next(8), Duration::from_millis(64_000));
//! assert_eq!(backoff.next(50), Duration::from_millis(64_000));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Reconnect backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied on top of the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Same as [`BackoffPolicy::sse`].
    fn default() -> Self {
        Self::sse()
    }
}

impl BackoffPolicy {
    /// The stream reconnect schedule: 500ms, doubling per failure, capped at
    /// 128× (64s), no jitter.
    pub const fn sse() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_millis(64_000),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay for the given (post-increment) attempt counter.
    ///
    /// `attempt = 0` is treated like `attempt = 1`.
    ///
    /// # Notes
    /// - Non-finite or oversized intermediate values clamp to [`BackoffPolicy::max`].
    /// - Jitter is applied to the clamped base and never feeds back into later attempts.
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_secs = self.max.as_secs_f64();
        let unclamped = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !unclamped.is_finite() || unclamped < 0.0 || unclamped > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped)
        };
        self.jitter.apply(base)
    }
}
