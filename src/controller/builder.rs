//! # Controller builder.
//!
//! ```text
//! ControllerBuilder::new(name)          library defaults
//! ControllerBuilder::from_config(name)  defaults taken from Config
//!     .workers(n)
//!     .rate_limiter(limiter)
//!     .reconcile_timeout(d)
//!     .build(reconciler) ──► Arc<Controller>
//! ```

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::controller::Controller;
use crate::core::Config;
use crate::queue::{RateLimiter, WorkQueue};
use crate::reconciler::ReconcilerRef;

/// Builder for [`Controller`].
pub struct ControllerBuilder {
    name: String,
    workers: usize,
    limiter: Arc<dyn RateLimiter>,
    reconcile_timeout: Option<Duration>,
}

impl ControllerBuilder {
    /// Builder seeded from [`Config::default`].
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(name, &Config::default())
    }

    /// Builder seeded from `cfg`: worker count, rate limiter, reconcile timeout.
    pub fn from_config(name: impl Into<String>, cfg: &Config) -> Self {
        Self {
            name: name.into(),
            workers: cfg.worker_count(),
            limiter: cfg.rate_limiter(),
            reconcile_timeout: cfg.default_reconcile_timeout(),
        }
    }

    /// Number of concurrent workers (min 1). Fixed for the controller's lifetime.
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }

    /// Rate limiter deciding retry delays of failed keys.
    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Per-attempt reconcile timeout; `Duration::ZERO` disables it.
    pub fn reconcile_timeout(mut self, timeout: Duration) -> Self {
        self.reconcile_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Builds the controller around `reconciler`.
    pub fn build(self, reconciler: ReconcilerRef) -> Arc<Controller> {
        let name: Arc<str> = self.name.into();
        Arc::new(Controller {
            queue: WorkQueue::new(Arc::clone(&name), self.limiter),
            name,
            reconciler,
            workers: self.workers,
            reconcile_timeout: self.reconcile_timeout,
            watches: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use crate::key::ReconcileKey;
    use crate::reconciler::ReconcileFn;

    fn noop() -> ReconcilerRef {
        ReconcileFn::arc(|_k: ReconcileKey| async { Ok::<_, ReconcileError>(()) })
    }

    #[test]
    fn seeds_from_config() {
        let cfg = Config {
            workers: 4,
            reconcile_timeout: Duration::from_secs(2),
            ..Config::default()
        };
        let c = ControllerBuilder::from_config("rs", &cfg).build(noop());
        assert_eq!(c.name(), "rs");
        assert_eq!(c.queue().name(), "rs");
        assert_eq!(c.workers(), 4);
        assert_eq!(c.reconcile_timeout(), Some(Duration::from_secs(2)));
        assert!(!c.is_started());
    }

    #[test]
    fn overrides() {
        let c = Controller::builder("rs")
            .workers(0)
            .reconcile_timeout(Duration::ZERO)
            .build(noop());
        assert_eq!(c.workers(), 1);
        assert_eq!(c.reconcile_timeout(), None);
    }
}
