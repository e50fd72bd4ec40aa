//! # Informer registry.
//!
//! Maps an [`ObjectKind`] to the informer that watches it. Populated during
//! setup (`&mut self`), read during the run phase (`&self`); the borrow rules
//! enforce the write-before-read discipline, so no lock is needed.
//!
//! ## Architecture
//! ```text
//! register::<K>(informer)  ──► entries[K::KIND] = Registered<K>
//! lookup::<K>()            ──► entries[K::KIND] ─downcast─► Arc<dyn Informer<K>>
//! sources()                ──► type-erased handles used by the runner
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SetupError;
use crate::informer::Informer;
use crate::key::{Object, ObjectKind};

/// Kind-erased view of a registered informer, used by the runner.
#[async_trait]
pub(crate) trait Source: Send + Sync {
    fn kind(&self) -> ObjectKind;
    fn as_any(&self) -> &dyn Any;
    async fn run(&self, token: CancellationToken);
    async fn wait_for_sync(&self);
}

struct Registered<K: Object> {
    informer: Arc<dyn Informer<K>>,
}

#[async_trait]
impl<K: Object> Source for Registered<K> {
    fn kind(&self) -> ObjectKind {
        K::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn run(&self, token: CancellationToken) {
        self.informer.run(token).await;
    }

    async fn wait_for_sync(&self) {
        self.informer.wait_for_sync().await;
    }
}

/// Process-wide mapping from object kind to change-notification source.
#[derive(Default)]
pub struct InformerRegistry {
    entries: BTreeMap<ObjectKind, Arc<dyn Source>>,
}

impl InformerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the informer for `K::KIND`.
    ///
    /// # Errors
    /// [`SetupError::DuplicateRegistration`] if the kind already has an informer.
    pub fn register<K, I>(&mut self, informer: Arc<I>) -> Result<(), SetupError>
    where
        K: Object,
        I: Informer<K>,
    {
        if self.entries.contains_key(&K::KIND) {
            return Err(SetupError::DuplicateRegistration { kind: K::KIND });
        }
        let informer: Arc<dyn Informer<K>> = informer;
        self.entries
            .insert(K::KIND, Arc::new(Registered { informer }));
        Ok(())
    }

    /// Returns the informer registered for `K::KIND`.
    ///
    /// # Errors
    /// - [`SetupError::NotFound`] if nothing is registered for the kind;
    /// - [`SetupError::KindMismatch`] if it was registered for another Rust type.
    pub fn lookup<K: Object>(&self) -> Result<Arc<dyn Informer<K>>, SetupError> {
        let entry = self
            .entries
            .get(&K::KIND)
            .ok_or(SetupError::NotFound { kind: K::KIND })?;
        entry
            .as_any()
            .downcast_ref::<Registered<K>>()
            .map(|r| Arc::clone(&r.informer))
            .ok_or(SetupError::KindMismatch {
                kind: K::KIND,
                expected: std::any::type_name::<K>(),
            })
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<ObjectKind> {
        self.entries.keys().copied().collect()
    }

    /// Number of registered informers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn sources(&self) -> impl Iterator<Item = Arc<dyn Source>> + '_ {
        self.entries.values().cloned()
    }
}
