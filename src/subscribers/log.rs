//! # LogWriter: events as `tracing` records.
//!
//! Renders every [`Event`] through `tracing` with structured fields, so the
//! binary decides format and filtering via its `tracing-subscriber` setup.
//!
//! ## Levels
//! - `info`:  startup, shutdown, successful reconciles of retried keys
//! - `warn`:  reconcile failures, overflow, grace exceeded, sync timeout
//! - `error`: subscriber panics
//! - `debug`: per-attempt noise (starting, first-try successes, requeues)

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that logs events via `tracing`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let controller = e.controller.as_deref().unwrap_or("-");
        let key = e.key.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        let kind = e.object_kind.map(|k| k.to_string()).unwrap_or_default();

        match e.kind {
            EventKind::InformerStarted => info!(seq = e.seq, %kind, "informer started"),
            EventKind::CacheSynced => info!(seq = e.seq, %kind, "cache synced"),
            EventKind::CacheSyncTimedOut => {
                warn!(seq = e.seq, unsynced = reason, "cache sync timed out")
            }
            EventKind::WatchRegistered => {
                info!(seq = e.seq, controller, %kind, transform = reason, "watch registered")
            }
            EventKind::ControllerStarted => {
                info!(seq = e.seq, controller, workers = e.attempt, "controller started")
            }
            EventKind::ReconcileStarting => {
                debug!(seq = e.seq, controller, key, attempt = e.attempt, "reconciling")
            }
            EventKind::ReconcileSucceeded => match e.attempt {
                Some(n) if n > 1 => {
                    info!(seq = e.seq, controller, key, attempt = n, "reconciled after retries")
                }
                _ => debug!(seq = e.seq, controller, key, "reconciled"),
            },
            EventKind::ReconcileFailed => warn!(
                seq = e.seq,
                controller,
                key,
                attempt = e.attempt,
                error = reason,
                "reconcile failed"
            ),
            EventKind::RequeueScheduled => debug!(
                seq = e.seq,
                controller,
                key,
                attempt = e.attempt,
                delay_ms = e.delay_ms,
                "requeue scheduled"
            ),
            EventKind::ShutdownRequested => info!(seq = e.seq, "shutdown requested"),
            EventKind::AllStoppedWithin => info!(seq = e.seq, "all workers stopped within grace"),
            EventKind::GraceExceeded => {
                warn!(seq = e.seq, in_flight = reason, "grace exceeded")
            }
            EventKind::SubscriberOverflow => {
                warn!(seq = e.seq, subscriber = controller, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                error!(seq = e.seq, subscriber = controller, info = reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
