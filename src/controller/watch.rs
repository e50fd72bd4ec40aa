//! # Watch registration.
//!
//! Each `watch*` call binds one object kind to the controller:
//! 1. looks up the kind's informer (`UnknownKind` if none is registered);
//! 2. installs a [`QueueHandler`] that runs the transform on add, update and
//!    delete and adds the resulting keys to the controller's queue;
//! 3. records a [`WatchBinding`] for diagnostics.
//!
//! On update only the new object is transformed. If an update changes the
//! keys an object maps to, the keys it mapped to before are not re-triggered.

use std::sync::Arc;

use crate::controller::Controller;
use crate::error::SetupError;
use crate::informer::{EventHandler, InformerRegistry};
use crate::key::{Object, ObjectKind, ReconcileKey};
use crate::queue::WorkQueue;
use crate::transform::Transform;

/// A watched kind and the transform feeding the controller's queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchBinding {
    /// Watched kind.
    pub kind: ObjectKind,
    /// Transform label (`identity`, `single`, `multi`, `single_key`, `multi_key`).
    pub transform: &'static str,
}

/// Informer callbacks that enqueue transformed keys.
struct QueueHandler<K> {
    queue: Arc<WorkQueue>,
    transform: Transform<K>,
}

impl<K: Object> QueueHandler<K> {
    fn enqueue(&self, obj: &K) {
        for key in self.transform.keys(obj) {
            self.queue.add(key);
        }
    }
}

impl<K: Object> EventHandler<K> for QueueHandler<K> {
    fn on_add(&self, obj: &K) {
        self.enqueue(obj);
    }

    fn on_update(&self, _old: &K, new: &K) {
        self.enqueue(new);
    }

    fn on_delete(&self, obj: &K) {
        self.enqueue(obj);
    }
}

impl Controller {
    /// Watches `K` as the primary kind: every change enqueues the object's own key.
    ///
    /// # Errors
    /// [`SetupError::UnknownKind`] if no informer is registered for `K::KIND`;
    /// [`SetupError::KindMismatch`] if it is registered under another type.
    pub fn watch<K: Object>(&self, informers: &InformerRegistry) -> Result<(), SetupError> {
        self.watch_with(informers, Transform::<K>::Identity)
    }

    /// Watches secondary kind `K`, mapping each object to one `namespace/name` string.
    /// An empty or unparsable string enqueues nothing.
    pub fn watch_transformation_of<K: Object>(
        &self,
        informers: &InformerRegistry,
        f: impl Fn(&K) -> String + Send + Sync + 'static,
    ) -> Result<(), SetupError> {
        self.watch_with(informers, Transform::single(f))
    }

    /// Watches secondary kind `K`, mapping each object to several `namespace/name` strings.
    pub fn watch_transformations_of<K: Object>(
        &self,
        informers: &InformerRegistry,
        f: impl Fn(&K) -> Vec<String> + Send + Sync + 'static,
    ) -> Result<(), SetupError> {
        self.watch_with(informers, Transform::multi(f))
    }

    /// Watches secondary kind `K`, mapping each object to one pre-built key.
    /// `ReconcileKey::default()` enqueues nothing.
    pub fn watch_transformation_key_of<K: Object>(
        &self,
        informers: &InformerRegistry,
        f: impl Fn(&K) -> ReconcileKey + Send + Sync + 'static,
    ) -> Result<(), SetupError> {
        self.watch_with(informers, Transform::single_key(f))
    }

    /// Watches secondary kind `K`, mapping each object to several pre-built keys.
    pub fn watch_transformation_keys_of<K: Object>(
        &self,
        informers: &InformerRegistry,
        f: impl Fn(&K) -> Vec<ReconcileKey> + Send + Sync + 'static,
    ) -> Result<(), SetupError> {
        self.watch_with(informers, Transform::multi_key(f))
    }

    /// Watches kind `K` through an arbitrary [`Transform`].
    pub fn watch_with<K: Object>(
        &self,
        informers: &InformerRegistry,
        transform: Transform<K>,
    ) -> Result<(), SetupError> {
        let informer = informers.lookup::<K>().map_err(|e| match e {
            SetupError::NotFound { kind } => SetupError::UnknownKind {
                kind,
                controller: self.name.to_string(),
            },
            other => other,
        })?;

        let binding = WatchBinding {
            kind: K::KIND,
            transform: transform.label(),
        };
        informer.add_event_handler(Arc::new(QueueHandler {
            queue: Arc::clone(&self.queue),
            transform,
        }));
        self.bindings().push(binding);
        Ok(())
    }
}
