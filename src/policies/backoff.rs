//! # Exponential backoff for failed keys.
//!
//! [`BackoffPolicy`] maps "how many times has this key failed in a row" to a
//! requeue delay:
//!
//! ```text
//! delay(n) = min(first × factor^n, max)   then jitter
//! ```
//!
//! The failure count is owned by the rate limiter, not by the policy, so the
//! policy is a pure function of `n`. Jitter is applied to the clamped value
//! only and never feeds back into the next computation.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use keyvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(5),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(5));
//! assert_eq!(backoff.next(3), Duration::from_millis(40));
//! assert_eq!(backoff.next(20), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Per-key retry backoff.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Growth factor per consecutive failure (`>= 1.0` keeps delays non-decreasing).
    pub factor: f64,
    /// Randomization applied after clamping.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 5ms`, `factor = 2.0`, `max = 1000s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(5),
            max: Duration::from_secs(1000),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retrying a key that has already failed `failures` times
    /// (0 = this is the first failure).
    pub fn next(&self, failures: u32) -> Duration {
        self.jitter.apply(self.base(failures))
    }

    /// Un-jittered delay: `first × factor^failures`, clamped to `max`.
    ///
    /// Overflow and non-finite intermediate values clamp to `max`.
    pub fn base(&self, failures: u32) -> Duration {
        let exp = i32::try_from(failures).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::from_secs_f64(secs)
    }
}
