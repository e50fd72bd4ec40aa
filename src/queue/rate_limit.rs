//! # Requeue rate limiters.
//!
//! A [`RateLimiter`] answers "how long should this key wait before it is
//! retried?". The work queue asks it on every
//! [`add_rate_limited`](crate::WorkQueue::add_rate_limited) and tells it to
//! drop a key's history on [`forget`](crate::WorkQueue::forget).
//!
//! ## Implementations
//! - [`ItemBackoffLimiter`]: per-key exponential backoff ([`BackoffPolicy`])
//! - [`BucketRateLimiter`]: one token bucket shared by all keys (overall qps)
//! - [`MaxOfRateLimiter`]: the slowest answer of several limiters
//!
//! [`default_controller_limiter`] combines the first two, so a single key
//! backs off exponentially while a storm of failing keys is still capped at
//! `qps` retries per second overall.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::key::ReconcileKey;
use crate::policies::BackoffPolicy;

/// Decides requeue delays for failing keys.
pub trait RateLimiter: Send + Sync + 'static {
    /// Delay before `key` may be processed again. Counts as one requeue.
    fn when(&self, key: &ReconcileKey) -> Duration;

    /// Drops the failure history of `key`.
    fn forget(&self, key: &ReconcileKey);

    /// Requeues recorded for `key` since it was last forgotten.
    fn num_requeues(&self, key: &ReconcileKey) -> u32;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-key exponential backoff.
///
/// The n-th consecutive failure of a key waits `policy.next(n)`; `forget`
/// resets the key to the base delay.
pub struct ItemBackoffLimiter {
    policy: BackoffPolicy,
    failures: Mutex<HashMap<ReconcileKey, u32>>,
}

impl ItemBackoffLimiter {
    /// Creates a limiter using `policy`.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            failures: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for ItemBackoffLimiter {
    fn when(&self, key: &ReconcileKey) -> Duration {
        let failures = {
            let mut map = lock(&self.failures);
            let entry = map.entry(key.clone()).or_insert(0);
            let n = *entry;
            *entry = n.saturating_add(1);
            n
        };
        self.policy.next(failures)
    }

    fn forget(&self, key: &ReconcileKey) {
        lock(&self.failures).remove(key);
    }

    fn num_requeues(&self, key: &ReconcileKey) -> u32 {
        lock(&self.failures).get(key).copied().unwrap_or(0)
    }
}

struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Token bucket shared by all keys: `burst` immediate retries, then `qps` per second.
///
/// Tokens may go negative, which reserves a slot in the future; the returned
/// delay is the wait until that slot.
pub struct BucketRateLimiter {
    qps: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl BucketRateLimiter {
    /// Creates a full bucket. `qps <= 0` disables the limit.
    pub fn new(qps: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            qps,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }
}

impl RateLimiter for BucketRateLimiter {
    fn when(&self, _key: &ReconcileKey) -> Duration {
        if !(self.qps > 0.0) {
            return Duration::ZERO;
        }
        let mut b = lock(&self.bucket);
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(b.last).as_secs_f64();
        b.last = now;
        b.tokens = (b.tokens + elapsed * self.qps).min(self.burst) - 1.0;

        if b.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(-b.tokens / self.qps).unwrap_or(Duration::MAX)
        }
    }

    fn forget(&self, _key: &ReconcileKey) {}

    fn num_requeues(&self, _key: &ReconcileKey) -> u32 {
        0
    }
}

/// Combines limiters: the delay is the maximum of all answers.
pub struct MaxOfRateLimiter {
    limiters: Vec<Arc<dyn RateLimiter>>,
}

impl MaxOfRateLimiter {
    /// Creates a combined limiter.
    pub fn new(limiters: Vec<Arc<dyn RateLimiter>>) -> Self {
        Self { limiters }
    }
}

impl RateLimiter for MaxOfRateLimiter {
    fn when(&self, key: &ReconcileKey) -> Duration {
        self.limiters
            .iter()
            .map(|l| l.when(key))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn forget(&self, key: &ReconcileKey) {
        for l in &self.limiters {
            l.forget(key);
        }
    }

    fn num_requeues(&self, key: &ReconcileKey) -> u32 {
        self.limiters
            .iter()
            .map(|l| l.num_requeues(key))
            .max()
            .unwrap_or(0)
    }
}

/// Per-key backoff combined with an overall token bucket.
pub fn default_controller_limiter(
    backoff: BackoffPolicy,
    qps: f64,
    burst: u32,
) -> Arc<dyn RateLimiter> {
    Arc::new(MaxOfRateLimiter::new(vec![
        Arc::new(ItemBackoffLimiter::new(backoff)),
        Arc::new(BucketRateLimiter::new(qps, burst)),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::JitterPolicy;

    fn backoff() -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(5),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn item_backoff_grows_per_key_and_resets_on_forget() {
        let l = ItemBackoffLimiter::new(backoff());
        let a = ReconcileKey::new("default", "a");
        let b = ReconcileKey::new("default", "b");

        assert_eq!(l.when(&a), Duration::from_millis(5));
        assert_eq!(l.when(&a), Duration::from_millis(10));
        assert_eq!(l.when(&a), Duration::from_millis(20));
        assert_eq!(l.when(&b), Duration::from_millis(5));
        assert_eq!(l.num_requeues(&a), 3);

        l.forget(&a);
        assert_eq!(l.num_requeues(&a), 0);
        assert_eq!(l.when(&a), Duration::from_millis(5));
    }

    #[test]
    fn item_backoff_is_monotonic_until_forget() {
        let l = ItemBackoffLimiter::new(backoff());
        let k = ReconcileKey::new("default", "k");
        let mut prev = Duration::ZERO;
        for _ in 0..30 {
            let d = l.when(&k);
            assert!(d >= prev);
            prev = d;
        }
        assert_eq!(prev, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn bucket_allows_burst_then_spaces_out() {
        let l = BucketRateLimiter::new(10.0, 2);
        let k = ReconcileKey::cluster("k");
        assert_eq!(l.when(&k), Duration::ZERO);
        assert_eq!(l.when(&k), Duration::ZERO);
        assert_eq!(l.when(&k), Duration::from_millis(100));
        assert_eq!(l.when(&k), Duration::from_millis(200));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(l.when(&k), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn max_of_takes_slowest() {
        let l = default_controller_limiter(backoff(), 1.0, 1);
        let k = ReconcileKey::cluster("k");
        assert_eq!(l.when(&k), Duration::from_millis(5));
        assert_eq!(l.when(&k), Duration::from_secs(1));
        assert_eq!(l.num_requeues(&k), 2);
        l.forget(&k);
        assert_eq!(l.num_requeues(&k), 0);
    }
}
