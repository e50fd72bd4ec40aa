//! # Closure-backed reconciler.
//!
//! [`ReconcileFn`] wraps `F: Fn(ReconcileKey) -> Fut`, producing a fresh
//! future per call. State shared between calls must be captured explicitly
//! (e.g. an `Arc<...>` cloned into the closure).
//!
//! ```rust
//! use keyvisor::{ReconcileError, ReconcileFn, ReconcileKey, ReconcilerRef};
//!
//! let r: ReconcilerRef = ReconcileFn::arc(|key: ReconcileKey| async move {
//!     println!("reconciling {key}");
//!     Ok::<_, ReconcileError>(())
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ReconcileError;
use crate::key::ReconcileKey;
use crate::reconciler::Reconcile;

/// Function-backed reconciler.
pub struct ReconcileFn<F> {
    f: F,
}

impl<F> ReconcileFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Reconcile for ReconcileFn<F>
where
    F: Fn(ReconcileKey) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ReconcileError>> + Send + 'static,
{
    async fn reconcile(&self, key: ReconcileKey) -> Result<(), ReconcileError> {
        (self.f)(key).await
    }
}
