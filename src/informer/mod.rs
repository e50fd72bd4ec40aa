//! # Change-notification sources.
//!
//! An [`Informer`] watches one object kind and reports every add, update and
//! delete to its registered [`EventHandler`]s. The runtime never looks inside
//! the objects: it only hands them to transforms.
//!
//! ## Contract
//! - Handlers are registered during setup, before [`Informer::run`] is called.
//! - Callbacks for one informer are invoked one at a time; different informers
//!   deliver concurrently with each other and with reconciliation.
//! - [`Informer::wait_for_sync`] completes once the initial list has been
//!   delivered to every handler.
//!
//! ## Contents
//! - [`Informer`], [`EventHandler`] the collaborator contract
//! - [`MemoryInformer`] an in-process informer backed by a map (tests, demos,
//!   sources fed from channels)
//! - [`InformerRegistry`] kind → informer mapping consulted by watches

mod memory;
mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::key::Object;

pub use memory::MemoryInformer;
pub use registry::InformerRegistry;

/// Receives change notifications for objects of kind `K`.
///
/// Callbacks run on the informer's delivery task and must not block.
pub trait EventHandler<K>: Send + Sync + 'static {
    /// An object appeared (including objects from the initial list).
    fn on_add(&self, obj: &K);

    /// An object changed. `old` is the previously cached version.
    fn on_update(&self, old: &K, new: &K);

    /// An object disappeared. `obj` is the last known version.
    fn on_delete(&self, obj: &K);
}

/// Change-notification source for one object kind.
#[async_trait]
pub trait Informer<K: Object>: Send + Sync + 'static {
    /// Registers a handler. Handlers added after `run` started may miss events.
    fn add_event_handler(&self, handler: Arc<dyn EventHandler<K>>);

    /// Delivers events until `token` is cancelled.
    async fn run(&self, token: CancellationToken);

    /// Completes once the initial list has been delivered.
    async fn wait_for_sync(&self);
}
