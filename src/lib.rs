//! # keyvisor
//!
//! **Keyvisor** is a watch-driven reconciliation engine for tokio.
//!
//! It watches collections of objects through informers, maps every change on
//! a watched object to the keys of the *primary* objects that must be
//! re-evaluated, and drives those keys through a user-supplied reconcile
//! function with at-least-once delivery, per-key serialization, retry with
//! backoff and bounded concurrency.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌──────────────┐   ┌──────────────┐
//!   │ Informer<RS> │   │ Informer<Pod>│        (change-notification sources)
//!   └──────┬───────┘   └──────┬───────┘
//!          │ add/update/delete│
//!          ▼                  ▼
//!   ┌──────────────┐   ┌──────────────┐
//!   │ QueueHandler │   │ QueueHandler │        (one per watch binding)
//!   │  Identity    │   │  Single(f)   │──► Transform::keys(obj)
//!   └──────┬───────┘   └──────┬───────┘       sentinels dropped, deduped,
//!          └────────┬─────────┘               panics contained
//!                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │ WorkQueue (per controller)                                        │
//! │  queued (FIFO, deduped) ─► in_flight ─► done ─► dirty? requeue    │
//! │  delayed (min-heap) ◄── add_after / add_rate_limited              │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!    worker 1           worker 2           worker N       (Controller)
//!        │ reconcile(key)   │                  │
//!        ├─ Ok  ─► forget(key), done(key)      │
//!        └─ Err ─► add_rate_limited(key), done(key)
//!        │
//!        ▼ publish(Event)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                   Bus (broadcast channel)                         │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       Manager listener ──► SubscriberSet
//!                                             ├──► LogWriter (tracing)
//!                                             └──► custom subscribers
//! ```
//!
//! ### Lifecycle
//! ```text
//! Manager::builder(cfg).with_subscribers(..).build()
//!   ├─► register_informer::<K>(informer)        (InformerRegistry)
//!   ├─► controller(name).build(reconciler)
//!   │     └─► watch / watch_transformation*_of   (UnknownKind if unregistered)
//!   ├─► add_controller(controller)              (DuplicateController)
//!   └─► run(args)
//!         ├─ start informers ─► wait for sync (CacheSyncTimeout)
//!         ├─ start controllers (delay loop + N workers each)
//!         ├─ wait: stop token | OS signal
//!         └─ shut queues down, cancel informers, join within grace
//! ```
//!
//! ## Features
//! | Area          | Description                                              | Key types / traits                          |
//! |---------------|----------------------------------------------------------|---------------------------------------------|
//! | **Objects**   | Watched kinds and reconcile keys.                        | [`Object`], [`ObjectKind`], [`ReconcileKey`] |
//! | **Informers** | Change-notification contract, in-memory implementation.  | [`Informer`], [`MemoryInformer`]            |
//! | **Transforms**| Object → keys mapping, five cardinalities.               | [`Transform`]                               |
//! | **Queue**     | Deduplicating, rate-limited work queue.                  | [`WorkQueue`], [`RateLimiter`]              |
//! | **Controllers**| Watches, worker pool, retries.                          | [`Controller`], [`Reconcile`], [`ReconcileFn`] |
//! | **Runtime**   | Composition root and run loop.                           | [`Manager`], [`run_informers_and_controllers`] |
//! | **Events**    | Observability hooks.                                     | [`Subscribe`], [`LogWriter`], [`Event`]     |
//! | **Errors**    | Typed setup, runtime and reconcile errors.               | [`SetupError`], [`RuntimeError`], [`ReconcileError`] |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use keyvisor::{
//!     Config, Manager, MemoryInformer, Object, ObjectKind, ReconcileError, ReconcileFn,
//!     ReconcileKey,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! struct Pod { namespace: String, name: String }
//! impl Object for Pod {
//!     const KIND: ObjectKind = ObjectKind::new("", "v1", "Pod");
//!     fn namespace(&self) -> &str { &self.namespace }
//!     fn name(&self) -> &str { &self.name }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config { handle_signals: false, ..Config::default() };
//!     let mut mgr = Manager::builder(cfg).build();
//!
//!     let pods = MemoryInformer::<Pod>::arc();
//!     mgr.register_informer::<Pod, _>(pods.clone())?;
//!
//!     let stop = CancellationToken::new();
//!     let done = stop.clone();
//!     let controller = mgr.controller("replicasets").build(ReconcileFn::arc(
//!         move |key: ReconcileKey| {
//!             let done = done.clone();
//!             async move {
//!                 assert_eq!(key, ReconcileKey::new("default", "rs1"));
//!                 done.cancel();
//!                 Ok::<_, ReconcileError>(())
//!             }
//!         },
//!     ));
//!     // Pod "rs1-abc" belongs to ReplicaSet "rs1".
//!     controller.watch_transformation_of(mgr.informers(), |p: &Pod| {
//!         let owner = p.name.split('-').next().unwrap_or_default();
//!         format!("{}/{}", p.namespace, owner)
//!     })?;
//!     mgr.add_controller(controller)?;
//!
//!     pods.apply(Pod { namespace: "default".into(), name: "rs1-abc".into() });
//!
//!     let mut args = mgr.run_arguments().with_stop(stop);
//!     args.grace = Duration::from_secs(5);
//!     mgr.run(args).await?;
//!     Ok(())
//! }
//! ```

mod controller;
mod core;
mod error;
mod events;
mod informer;
mod key;
mod policies;
mod queue;
mod reconciler;
mod subscribers;
mod transform;

// ---- Public re-exports ----

pub use crate::core::{
    Config, Manager, ManagerBuilder, RunArguments, run_informers_and_controllers,
};
pub use controller::{Controller, ControllerBuilder, ControllerRegistry, WatchBinding};
pub use error::{ReconcileError, RuntimeError, SetupError};
pub use events::{Bus, Event, EventKind};
pub use informer::{EventHandler, Informer, InformerRegistry, MemoryInformer};
pub use key::{Object, ObjectKind, ReconcileKey};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use queue::{
    BucketRateLimiter, ItemBackoffLimiter, MaxOfRateLimiter, RateLimiter, WorkQueue,
    default_controller_limiter,
};
pub use reconciler::{Reconcile, ReconcileFn, ReconcilerRef};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use transform::Transform;

/// Renders a caught panic payload (`&str` or `String`) for logs and errors.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
