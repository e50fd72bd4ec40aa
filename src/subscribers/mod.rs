//! # Event subscribers.
//!
//! Observability hooks for the runtime: anything that wants to see
//! [`Event`](crate::Event)s implements [`Subscribe`] and is handed to
//! [`ManagerBuilder::with_subscribers`](crate::ManagerBuilder::with_subscribers).
//!
//! ```text
//! Bus ──► Manager listener ──► SubscriberSet::emit(&Event)
//!                                   ├──► [queue] ──► LogWriter (tracing)
//!                                   └──► [queue] ──► custom subscriber ...
//! ```
//!
//! ## Implementing a subscriber
//! ```no_run
//! use async_trait::async_trait;
//! use keyvisor::{Event, EventKind, Subscribe};
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ReconcileFailed {
//!             // bump a counter
//!         }
//!     }
//!     fn name(&self) -> &'static str { "failures" }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
