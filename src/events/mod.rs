//! Runtime events: types and broadcast bus.
//!
//! Groups the event **data model** and the **bus** that carries it from the
//! runner, the controllers and the reconcile workers to subscribers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `core::runner` (informer/cache/shutdown events),
//!   `Controller` (watch registration, worker lifecycle),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the listener started by `Manager::run`, which fans out to
//!   the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
