//! # Manager: composition root of the runtime.
//!
//! The [`Manager`] owns the [`InformerRegistry`], the [`ControllerRegistry`],
//! the event [`Bus`] and the subscribers. Setup happens through `&mut self`,
//! so registration is finished before [`Manager::run`] borrows it.
//!
//! ## Architecture
//! ```text
//! Setup:
//!   register_informer::<K>(informer) ──► InformerRegistry
//!   controller(name).build(reconciler) ──► Arc<Controller>
//!       └─► controller.watch*::<K>(manager.informers())
//!   add_controller(controller) ──► ControllerRegistry
//!
//! Run:
//!   run(args)
//!     ├─► listener: Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!     ├─► run_informers_and_controllers(informers, controllers, bus, args)
//!     └─► stop listener (drains buffered events), SubscriberSet::shutdown()
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use keyvisor::{
//!     Config, LogWriter, Manager, MemoryInformer, Object, ObjectKind, ReconcileError,
//!     ReconcileFn, ReconcileKey, Subscribe,
//! };
//!
//! struct ReplicaSet { namespace: String, name: String }
//! impl Object for ReplicaSet {
//!     const KIND: ObjectKind = ObjectKind::new("apps", "v1", "ReplicaSet");
//!     fn namespace(&self) -> &str { &self.namespace }
//!     fn name(&self) -> &str { &self.name }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let mut mgr = Manager::builder(Config::default()).with_subscribers(subs).build();
//!
//!     let replicasets = MemoryInformer::<ReplicaSet>::arc();
//!     mgr.register_informer::<ReplicaSet, _>(replicasets.clone())?;
//!
//!     let controller = mgr.controller("replicasets").workers(2).build(ReconcileFn::arc(
//!         |key: ReconcileKey| async move {
//!             println!("reconciling {key}");
//!             Ok::<_, ReconcileError>(())
//!         },
//!     ));
//!     controller.watch::<ReplicaSet>(mgr.informers())?;
//!     mgr.add_controller(controller)?;
//!
//!     // Blocks until SIGINT/SIGTERM.
//!     mgr.run(mgr.run_arguments()).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::controller::{Controller, ControllerBuilder, ControllerRegistry};
use crate::core::{Config, ManagerBuilder, RunArguments, run_informers_and_controllers};
use crate::error::{RuntimeError, SetupError};
use crate::events::Bus;
use crate::informer::{Informer, InformerRegistry};
use crate::key::Object;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Owns registries, event delivery and the run loop.
pub struct Manager {
    cfg: Config,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    informers: InformerRegistry,
    controllers: ControllerRegistry,
}

impl Manager {
    /// Creates a [`ManagerBuilder`] for configuring the manager.
    pub fn builder(cfg: Config) -> ManagerBuilder {
        ManagerBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            subscribers,
            informers: InformerRegistry::new(),
            controllers: ControllerRegistry::new(),
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus; subscribe to observe runtime events directly.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Registers the informer for `K::KIND`.
    ///
    /// # Errors
    /// [`SetupError::DuplicateRegistration`] if the kind already has an informer.
    pub fn register_informer<K, I>(&mut self, informer: Arc<I>) -> Result<(), SetupError>
    where
        K: Object,
        I: Informer<K>,
    {
        self.informers.register::<K, I>(informer)
    }

    /// Registered informers, for the controllers' `watch*` calls.
    pub fn informers(&self) -> &InformerRegistry {
        &self.informers
    }

    /// A controller builder seeded from this manager's [`Config`].
    pub fn controller(&self, name: impl Into<String>) -> ControllerBuilder {
        ControllerBuilder::from_config(name, &self.cfg)
    }

    /// Adds a controller to be started by [`run`](Self::run).
    ///
    /// # Errors
    /// [`SetupError::DuplicateController`] if this instance was already added.
    pub fn add_controller(&mut self, controller: Arc<Controller>) -> Result<(), SetupError> {
        self.controllers.add_controller(controller)
    }

    /// Registered controllers.
    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    /// Run arguments derived from the configuration, with a fresh stop token.
    pub fn run_arguments(&self) -> RunArguments {
        RunArguments::from_config(&self.cfg)
    }

    /// Runs informers and controllers until shutdown; see
    /// [`run_informers_and_controllers`].
    pub async fn run(&self, args: RunArguments) -> Result<(), RuntimeError> {
        let listener_token = CancellationToken::new();
        let listener = self.subscriber_listener(listener_token.clone());

        let res =
            run_informers_and_controllers(&self.informers, &self.controllers, &self.bus, args).await;

        listener_token.cancel();
        let _ = listener.await;
        res
    }

    /// Forwards bus events to the subscribers until `token` is cancelled,
    /// then drains what is buffered and shuts the subscriber workers down.
    fn subscriber_listener(&self, token: CancellationToken) -> JoinHandle<()> {
        let subs = SubscriberSet::new(self.subscribers.clone(), self.bus.clone());
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => subs.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "subscriber listener lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
            subs.shutdown().await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::{Semaphore, mpsc};

    use crate::error::ReconcileError;
    use crate::events::{Event, EventKind};
    use crate::informer::MemoryInformer;
    use crate::key::{ObjectKind, ReconcileKey};
    use crate::reconciler::ReconcileFn;

    struct Pod {
        namespace: String,
        name: String,
    }

    impl Object for Pod {
        const KIND: ObjectKind = ObjectKind::new("", "v1", "Pod");
        fn namespace(&self) -> &str {
            &self.namespace
        }
        fn name(&self) -> &str {
            &self.name
        }
    }

    struct ReplicaSet {
        namespace: String,
        name: String,
    }

    impl Object for ReplicaSet {
        const KIND: ObjectKind = ObjectKind::new("apps", "v1", "ReplicaSet");
        fn namespace(&self) -> &str {
            &self.namespace
        }
        fn name(&self) -> &str {
            &self.name
        }
    }

    fn pod(name: &str) -> Pod {
        Pod {
            namespace: "default".into(),
            name: name.into(),
        }
    }

    fn owner(p: &Pod) -> String {
        format!("{}/{}", p.namespace, p.name.split('-').next().unwrap_or_default())
    }

    fn config() -> Config {
        Config {
            handle_signals: false,
            ..Config::default()
        }
    }

    #[derive(Default)]
    struct Recorder {
        kinds: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.kinds.lock().expect("lock").push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn pod_changes_reconcile_the_owning_replicaset() {
        let pods = MemoryInformer::<Pod>::arc();
        let replicasets = MemoryInformer::<ReplicaSet>::arc();
        let recorder = Arc::new(Recorder::default());

        let subs: Vec<Arc<dyn Subscribe>> = vec![recorder.clone()];
        let mut mgr = Manager::builder(config()).with_subscribers(subs).build();
        mgr.register_informer::<Pod, _>(pods.clone()).expect("pods");
        mgr.register_informer::<ReplicaSet, _>(replicasets.clone())
            .expect("replicasets");

        let gate = Arc::new(Semaphore::new(0));
        let (tx, mut calls) = mpsc::unbounded_channel::<ReconcileKey>();
        let reconciler = {
            let gate = Arc::clone(&gate);
            ReconcileFn::arc(move |key: ReconcileKey| {
                let gate = Arc::clone(&gate);
                let tx = tx.clone();
                async move {
                    let _ = tx.send(key);
                    let _permit = gate
                        .acquire()
                        .await
                        .map_err(|e| ReconcileError::fail(e.to_string()))?;
                    Ok::<(), ReconcileError>(())
                }
            })
        };
        let c = mgr.controller("replicasets").workers(4).build(reconciler);
        c.watch::<ReplicaSet>(mgr.informers()).expect("primary");
        c.watch_transformation_of(mgr.informers(), owner).expect("secondary");
        mgr.add_controller(Arc::clone(&c)).expect("add");

        let stop = CancellationToken::new();
        let args = mgr.run_arguments().with_stop(stop.clone());
        let run = tokio::spawn(async move { mgr.run(args).await });

        pods.apply(pod("rs1-abc"));
        let first = calls.recv().await.expect("first reconcile");
        assert_eq!(first, ReconcileKey::new("default", "rs1"));

        // Two more pods of the same owner while the first reconcile is running.
        pods.apply(pod("rs1-x"));
        pods.apply(pod("rs1-y"));
        let last = ReconcileKey::new("default", "rs1-y");
        while pods.get(&last).is_none() {
            tokio::task::yield_now().await;
        }
        assert_eq!(c.queue().in_flight(), vec![first.clone()]);
        assert!(c.queue().is_empty());

        gate.add_permits(1);
        let second = calls.recv().await.expect("re-delivery of the dirty key");
        assert_eq!(second, first);

        stop.cancel();
        run.await.expect("join").expect("clean shutdown");
        assert!(calls.try_recv().is_err());

        let kinds = recorder.kinds.lock().expect("lock").clone();
        assert!(kinds.contains(&EventKind::CacheSynced));
        assert!(kinds.contains(&EventKind::ControllerStarted));
        assert_eq!(kinds.last(), Some(&EventKind::AllStoppedWithin));
    }

    #[test]
    fn duplicate_informer_and_controller_are_rejected() {
        let mut mgr = Manager::builder(config()).build();
        mgr.register_informer::<Pod, _>(MemoryInformer::<Pod>::arc())
            .expect("first");
        assert_eq!(
            mgr.register_informer::<Pod, _>(MemoryInformer::<Pod>::arc()),
            Err(SetupError::DuplicateRegistration { kind: Pod::KIND })
        );

        let c = mgr.controller("pods").build(ReconcileFn::arc(|_k: ReconcileKey| async {
            Ok::<_, ReconcileError>(())
        }));
        mgr.add_controller(Arc::clone(&c)).expect("first");
        assert!(matches!(
            mgr.add_controller(c),
            Err(SetupError::DuplicateController { .. })
        ));
        assert_eq!(mgr.controllers().len(), 1);
    }
}
