//! # Global runtime configuration.
//!
//! [`Config`] centralizes the runtime settings. It is used in two ways:
//! 1. **Manager creation**: `Manager::builder(config)`; bus capacity, run
//!    deadlines and signal handling come from here.
//! 2. **Controller defaults**: `Manager::controller(name)` seeds worker count,
//!    rate limiter and reconcile timeout from here.
//!
//! ## Sentinel values
//! - `reconcile_timeout = 0s` → no per-attempt timeout
//! - `workers = 0` → treated as 1
//! - `bucket_qps <= 0` → no overall retry limit

use std::sync::Arc;
use std::time::Duration;

use crate::policies::BackoffPolicy;
use crate::queue::{RateLimiter, default_controller_limiter};

/// Global configuration for the reconcile runtime.
///
/// All fields are public; prefer the helper accessors over repeating
/// sentinel checks.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default number of concurrent workers per controller.
    pub workers: usize,

    /// How long `run` waits for every informer's initial list.
    ///
    /// If exceeded, no controller is started and `run` returns
    /// `RuntimeError::CacheSyncTimeout`.
    pub cache_sync_timeout: Duration,

    /// Maximum wait for workers and informers to exit after shutdown is requested.
    pub grace: Duration,

    /// Capacity of the event bus ring buffer (min 1).
    pub bus_capacity: usize,

    /// Per-key retry backoff used by the default rate limiter.
    pub backoff: BackoffPolicy,

    /// Overall retry rate (tokens per second) of the default rate limiter.
    pub bucket_qps: f64,

    /// Burst size of the default rate limiter's token bucket.
    pub bucket_burst: u32,

    /// Default per-attempt reconcile timeout (`0s` = none).
    pub reconcile_timeout: Duration,

    /// Whether `run` also stops on SIGINT/SIGTERM/SIGQUIT (Ctrl-C on Windows).
    pub handle_signals: bool,
}

impl Config {
    /// Worker count with the `0 → 1` sentinel applied.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }

    /// Reconcile timeout as an `Option` (`0s` → `None`).
    #[inline]
    pub fn default_reconcile_timeout(&self) -> Option<Duration> {
        (!self.reconcile_timeout.is_zero()).then_some(self.reconcile_timeout)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Builds the default rate limiter (per-key backoff + token bucket).
    pub fn rate_limiter(&self) -> Arc<dyn RateLimiter> {
        default_controller_limiter(self.backoff, self.bucket_qps, self.bucket_burst)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `workers = 1`
    /// - `cache_sync_timeout = 30s`, `grace = 30s`
    /// - `bus_capacity = 1024`
    /// - `backoff = BackoffPolicy::default()` (5ms doubling up to 1000s)
    /// - `bucket_qps = 10`, `bucket_burst = 100`
    /// - `reconcile_timeout = 0s` (none)
    /// - `handle_signals = true`
    fn default() -> Self {
        Self {
            workers: 1,
            cache_sync_timeout: Duration::from_secs(30),
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
            backoff: BackoffPolicy::default(),
            bucket_qps: 10.0,
            bucket_burst: 100,
            reconcile_timeout: Duration::ZERO,
            handle_signals: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        let cfg = Config {
            workers: 0,
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.worker_count(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.default_reconcile_timeout(), None);

        let cfg = Config {
            reconcile_timeout: Duration::from_secs(3),
            ..Config::default()
        };
        assert_eq!(cfg.default_reconcile_timeout(), Some(Duration::from_secs(3)));
    }
}
