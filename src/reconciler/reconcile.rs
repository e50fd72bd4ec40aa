//! # Reconcile trait.
//!
//! A reconciler receives the key of one primary object and drives the world
//! toward that object's desired state. It is called concurrently for
//! *different* keys, never for the same key twice at once.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ReconcileError;
use crate::key::ReconcileKey;

/// User reconciliation logic.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use keyvisor::{Reconcile, ReconcileError, ReconcileKey};
///
/// struct ScaleReplicaSet;
///
/// #[async_trait]
/// impl Reconcile for ScaleReplicaSet {
///     async fn reconcile(&self, key: ReconcileKey) -> Result<(), ReconcileError> {
///         if key.namespace() == "kube-system" {
///             return Ok(());
///         }
///         // read desired state from a cache, act, report errors...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    /// Reconciles the object named by `key`.
    ///
    /// Any error re-queues the key with backoff. The call is not cancelled on
    /// shutdown; it is allowed to run to completion.
    async fn reconcile(&self, key: ReconcileKey) -> Result<(), ReconcileError>;
}

/// Shared handle to a reconciler.
pub type ReconcilerRef = Arc<dyn Reconcile>;
