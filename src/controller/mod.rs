//! # Controllers: watches, work queue and reconcile workers.
//!
//! A [`Controller`] owns one reconciler, one [`WorkQueue`](crate::WorkQueue)
//! and the watch bindings that feed it:
//!
//! ```text
//!  Informer<Pod> ──► QueueHandler<Pod> (transform) ──┐
//!  Informer<RS>  ──► QueueHandler<RS>  (identity)  ──┼──► WorkQueue ──► worker 1..N ──► Reconcile
//!                                                    │        ▲                │
//!                                                    │        └─ add_rate_limited (on error)
//! ```
//!
//! Controllers are built with [`ControllerBuilder`], wired with the `watch*`
//! methods during setup, collected in a [`ControllerRegistry`] and started
//! exactly once by the runner.

mod builder;
mod core;
mod registry;
mod watch;
mod worker;

pub use builder::ControllerBuilder;
pub use self::core::Controller;
pub use registry::ControllerRegistry;
pub use watch::WatchBinding;
