use std::sync::Arc;

use crate::core::{Config, Manager};
use crate::events::Bus;
use crate::subscribers::Subscribe;

/// Builder for [`Manager`].
pub struct ManagerBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ManagerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (startup, reconcile attempts,
    /// shutdown) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the manager. Does not need a running tokio runtime; subscriber
    /// workers are spawned by [`Manager::run`].
    pub fn build(self) -> Manager {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        Manager::new_internal(self.cfg, bus, self.subscribers)
    }
}
