//! # Runtime events emitted by the runner, controllers and workers.
//!
//! [`EventKind`] classifies events in four groups:
//! - **Startup**: informers starting and caches syncing, controllers starting
//! - **Reconcile**: one attempt starting, succeeding, failing, being requeued
//! - **Shutdown**: shutdown requested, finished within grace, grace exceeded
//! - **Subscriber**: overflow and panics of the subscribers themselves
//!
//! [`Event`] carries optional metadata (controller, key, kind, attempt, delay,
//! reason) filled in according to the kind.
//!
//! ## Ordering
//! Each event gets a process-wide monotonically increasing `seq`; use it to
//! restore publish order when events arrive out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use keyvisor::{Event, EventKind, ReconcileKey};
//!
//! let ev = Event::new(EventKind::RequeueScheduled)
//!     .with_controller("replicasets")
//!     .with_key(&ReconcileKey::new("default", "rs1"))
//!     .with_attempt(3)
//!     .with_delay(Duration::from_millis(40));
//!
//! assert_eq!(ev.key.as_deref(), Some("default/rs1"));
//! assert_eq!(ev.delay_ms, Some(40));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::key::{ObjectKind, ReconcileKey};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Startup ===
    /// An informer's run loop was spawned. Sets `object_kind`.
    InformerStarted,

    /// An informer reported its initial list as delivered. Sets `object_kind`.
    CacheSynced,

    /// Caches did not sync before the deadline. Sets `reason` (unsynced kinds).
    CacheSyncTimedOut,

    /// A watch was bound to a controller. Sets `controller`, `object_kind`,
    /// `reason` (transform label).
    WatchRegistered,

    /// A controller's worker pool was spawned. Sets `controller`, `attempt`
    /// (worker count).
    ControllerStarted,

    // === Reconcile ===
    /// A worker picked up a key. Sets `controller`, `key`, `attempt`
    /// (1 + previous consecutive failures).
    ReconcileStarting,

    /// Reconcile returned `Ok`; the key's failure history was forgotten.
    /// Sets `controller`, `key`, `attempt`.
    ReconcileSucceeded,

    /// Reconcile returned an error, timed out or panicked.
    /// Sets `controller`, `key`, `attempt`, `reason`.
    ReconcileFailed,

    /// A failed key was handed to the rate limiter.
    /// Sets `controller`, `key`, `attempt`, `delay_ms`.
    RequeueScheduled,

    // === Shutdown ===
    /// Stop token cancelled or OS signal observed.
    ShutdownRequested,

    /// All workers and informers exited within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded. Sets `reason` (in-flight keys).
    GraceExceeded,

    // === Subscribers ===
    /// A subscriber's queue was full or closed; the event was dropped for it.
    /// Sets `controller` (subscriber name), `reason`.
    SubscriberOverflow,

    /// A subscriber panicked while handling an event.
    /// Sets `controller` (subscriber name), `reason`.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide monotonic sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Controller (or subscriber) name.
    pub controller: Option<Arc<str>>,
    /// Reconcile key, rendered as `namespace/name`.
    pub key: Option<Arc<str>>,
    /// Watched kind.
    pub object_kind: Option<ObjectKind>,
    /// Attempt number or count, depending on `kind`.
    pub attempt: Option<u32>,
    /// Requeue delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Human-readable detail (errors, labels, lists).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates an event of the given kind with the current time and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            controller: None,
            key: None,
            object_kind: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a controller name.
    #[inline]
    pub fn with_controller(mut self, name: impl Into<Arc<str>>) -> Self {
        self.controller = Some(name.into());
        self
    }

    /// Attaches a reconcile key.
    #[inline]
    pub fn with_key(mut self, key: &ReconcileKey) -> Self {
        self.key = Some(key.to_string().into());
        self
    }

    /// Attaches a watched kind.
    #[inline]
    pub fn with_object_kind(mut self, kind: ObjectKind) -> Self {
        self.object_kind = Some(kind);
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(u32::try_from(d.as_millis()).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_controller(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_controller(subscriber)
            .with_reason(info)
    }
}
