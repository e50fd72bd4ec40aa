//! # In-process informer.
//!
//! [`MemoryInformer`] keeps a cache of objects keyed by their identity and
//! turns writes into handler callbacks:
//!
//! ```text
//! seed(objs)  ──► delivered as on_add before the cache reports synced
//! apply(obj)  ──► on_add (new key) | on_update(old, new) (known key)
//! delete(key) ──► on_delete(last) (known key) | nothing
//! ```
//!
//! Writes are queued on an unbounded channel and delivered by the single
//! [`run`](Informer::run) loop, so callbacks never overlap and `apply`/`delete`
//! never block. Writes issued before `run` are buffered and delivered after
//! the seeded objects.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::informer::{EventHandler, Informer};
use crate::key::{Object, ReconcileKey};

enum Delta<K> {
    Upsert(Arc<K>),
    Delete(ReconcileKey),
}

/// Map-backed informer for one object kind.
///
/// # Example
/// ```
/// use keyvisor::{MemoryInformer, Object, ObjectKind};
///
/// struct Node { name: String }
///
/// impl Object for Node {
///     const KIND: ObjectKind = ObjectKind::new("", "v1", "Node");
///     fn namespace(&self) -> &str { "" }
///     fn name(&self) -> &str { &self.name }
/// }
///
/// let nodes = MemoryInformer::<Node>::arc();
/// nodes.seed([Node { name: "n1".into() }]);
/// nodes.apply(Node { name: "n2".into() });
/// assert!(!nodes.has_synced());
/// ```
pub struct MemoryInformer<K> {
    cache: RwLock<HashMap<ReconcileKey, Arc<K>>>,
    handlers: RwLock<Vec<Arc<dyn EventHandler<K>>>>,
    initial: Mutex<Vec<Arc<K>>>,
    tx: mpsc::UnboundedSender<Delta<K>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Delta<K>>>>,
    synced: watch::Sender<bool>,
}

impl<K: Object> MemoryInformer<K> {
    /// Creates an empty informer.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            cache: RwLock::new(HashMap::new()),
            handlers: RwLock::new(Vec::new()),
            initial: Mutex::new(Vec::new()),
            tx,
            rx: Mutex::new(Some(rx)),
            synced: watch::Sender::new(false),
        }
    }

    /// Creates an empty informer behind an `Arc`, ready for registration.
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Adds objects to the initial list. Only effective before `run`.
    pub fn seed(&self, objs: impl IntoIterator<Item = K>) {
        let mut initial = self.initial.lock().unwrap_or_else(PoisonError::into_inner);
        initial.extend(objs.into_iter().map(Arc::new));
    }

    /// Adds or replaces an object.
    ///
    /// Writes made after the run loop has exited are dropped.
    pub fn apply(&self, obj: K) {
        let key = obj.key();
        if self.tx.send(Delta::Upsert(Arc::new(obj))).is_err() {
            debug!(kind = %K::KIND, object = %key, "informer stopped; apply dropped");
        }
    }

    /// Removes the object with the given key.
    ///
    /// Writes made after the run loop has exited are dropped.
    pub fn delete(&self, key: ReconcileKey) {
        if self.tx.send(Delta::Delete(key.clone())).is_err() {
            debug!(kind = %K::KIND, object = %key, "informer stopped; delete dropped");
        }
    }

    /// Cached object for `key`, as of the last delivered event.
    pub fn get(&self, key: &ReconcileKey) -> Option<Arc<K>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// All cached objects, sorted by key.
    pub fn list(&self) -> Vec<Arc<K>> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = cache.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, v)| Arc::clone(v)).collect()
    }

    /// True once the seeded objects have been delivered.
    pub fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    fn handlers(&self) -> Vec<Arc<dyn EventHandler<K>>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn deliver(&self, delta: Delta<K>) {
        match delta {
            Delta::Upsert(new) => {
                let old = self
                    .cache
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(new.key(), Arc::clone(&new));
                for h in self.handlers() {
                    match &old {
                        Some(old) => h.on_update(old, &new),
                        None => h.on_add(&new),
                    }
                }
            }
            Delta::Delete(key) => {
                let last = self
                    .cache
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&key);
                if let Some(last) = last {
                    for h in self.handlers() {
                        h.on_delete(&last);
                    }
                }
            }
        }
    }
}

impl<K: Object> Default for MemoryInformer<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: Object> Informer<K> for MemoryInformer<K> {
    fn add_event_handler(&self, handler: Arc<dyn EventHandler<K>>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    async fn run(&self, token: CancellationToken) {
        let rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(mut rx) = rx else {
            warn!(kind = %K::KIND, "memory informer already running");
            return;
        };

        let initial = {
            let mut initial = self.initial.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *initial)
        };
        for obj in initial {
            self.deliver(Delta::Upsert(obj));
        }
        self.synced.send_replace(true);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                delta = rx.recv() => match delta {
                    Some(delta) => self.deliver(delta),
                    None => break,
                },
            }
        }
    }

    async fn wait_for_sync(&self) {
        let mut rx = self.synced.subscribe();
        let _ = rx.wait_for(|synced| *synced).await;
    }
}
