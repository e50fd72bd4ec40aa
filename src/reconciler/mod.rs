//! # Reconcile callbacks.
//!
//! - [`Reconcile`] the user-supplied reconciliation logic
//! - [`ReconcileFn`] closure-backed implementation
//! - [`ReconcilerRef`] shared handle (`Arc<dyn Reconcile>`) held by a controller

mod reconcile;
mod reconcile_fn;

pub use reconcile::{Reconcile, ReconcilerRef};
pub use reconcile_fn::ReconcileFn;
