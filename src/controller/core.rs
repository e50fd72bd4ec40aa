use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;

use crate::controller::{ControllerBuilder, WatchBinding, worker};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::queue::WorkQueue;
use crate::reconciler::ReconcilerRef;

/// One reconcile loop: a reconciler, its work queue and a fixed worker pool.
///
/// A controller is created once, wired during setup, started once and runs
/// until its queue is shut down. It cannot be restarted.
pub struct Controller {
    pub(super) name: Arc<str>,
    pub(super) reconciler: ReconcilerRef,
    pub(super) queue: Arc<WorkQueue>,
    pub(super) workers: usize,
    pub(super) reconcile_timeout: Option<Duration>,
    pub(super) watches: Mutex<Vec<WatchBinding>>,
    pub(super) started: AtomicBool,
}

impl Controller {
    /// Starts building a controller named `name` with library defaults.
    ///
    /// Prefer [`Manager::controller`](crate::Manager::controller), which seeds
    /// the builder from the manager's [`Config`](crate::Config).
    pub fn builder(name: impl Into<String>) -> ControllerBuilder {
        ControllerBuilder::new(name)
    }

    /// Controller name, used in events and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The controller's work queue.
    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Number of concurrent workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Per-attempt reconcile timeout, if any.
    pub fn reconcile_timeout(&self) -> Option<Duration> {
        self.reconcile_timeout
    }

    /// Watch bindings recorded so far, in registration order.
    pub fn watches(&self) -> Vec<WatchBinding> {
        self.bindings().clone()
    }

    /// True once the worker pool was spawned.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(super) fn bindings(&self) -> MutexGuard<'_, Vec<WatchBinding>> {
        self.watches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the delay loop and the worker pool into `set`.
    ///
    /// # Errors
    /// [`RuntimeError::AlreadyStarted`] if the controller was started before.
    pub(crate) fn start(
        self: &Arc<Self>,
        set: &mut JoinSet<()>,
        bus: &Bus,
    ) -> Result<(), RuntimeError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyStarted {
                controller: self.name.to_string(),
            });
        }

        for binding in self.bindings().iter() {
            bus.publish(
                Event::new(EventKind::WatchRegistered)
                    .with_controller(Arc::clone(&self.name))
                    .with_object_kind(binding.kind)
                    .with_reason(binding.transform),
            );
        }

        set.spawn(Arc::clone(&self.queue).run_delay_loop());
        for _ in 0..self.workers {
            set.spawn(worker::run(Arc::clone(self), bus.clone()));
        }

        bus.publish(
            Event::new(EventKind::ControllerStarted)
                .with_controller(Arc::clone(&self.name))
                .with_attempt(u32::try_from(self.workers).unwrap_or(u32::MAX)),
        );
        Ok(())
    }
}
