//! # Example: watch_and_map
//!
//! Four controllers reconcile ReplicaSets. Each watches ReplicaSets directly
//! and Pods through a different transform, so a Pod change reconciles the
//! ReplicaSet(s) it belongs to.
//!
//! ```text
//! Pod default/rs1-abc
//!   ├─► owner-string    Transform::Single     → default/rs1
//!   ├─► parent-strings  Transform::Multi      → default/rs1-parent-1, default/rs1-parent-2
//!   ├─► owner-key       Transform::SingleKey  → default/rs1
//!   └─► parent-keys     Transform::MultiKey   → default/rs1-parent-1, default/rs1-parent-2
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example watch_and_map
//! ```

use std::sync::Arc;
use std::time::Duration;

use keyvisor::{
    Config, LogWriter, Manager, MemoryInformer, Object, ObjectKind, ReconcileError, ReconcileFn,
    ReconcileKey, ReconcilerRef, Subscribe,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

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

/// Owner name derived from the pod name: `rs1-abc` → `rs1`.
fn owner(p: &Pod) -> &str {
    p.name.split('-').next().unwrap_or_default()
}

fn printer(controller: &'static str) -> ReconcilerRef {
    ReconcileFn::arc(move |key: ReconcileKey| async move {
        println!("[{controller}] reconciling ReplicaSet {key}");
        Ok::<_, ReconcileError>(())
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // One time setup for the program.
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let mut mgr = Manager::builder(Config::default())
        .with_subscribers(subs)
        .build();

    let pods = MemoryInformer::<Pod>::arc();
    let replicasets = MemoryInformer::<ReplicaSet>::arc();
    mgr.register_informer::<Pod, _>(pods.clone())?;
    mgr.register_informer::<ReplicaSet, _>(replicasets.clone())?;

    // Per-controller setup.
    let c = mgr.controller("owner-string").build(printer("owner-string"));
    c.watch::<ReplicaSet>(mgr.informers())?;
    c.watch_transformation_of(mgr.informers(), |p: &Pod| {
        format!("{}/{}", p.namespace, owner(p))
    })?;
    mgr.add_controller(c)?;

    let c = mgr.controller("parent-strings").build(printer("parent-strings"));
    c.watch::<ReplicaSet>(mgr.informers())?;
    c.watch_transformations_of(mgr.informers(), |p: &Pod| {
        vec![
            format!("{}/{}-parent-1", p.namespace, owner(p)),
            format!("{}/{}-parent-2", p.namespace, owner(p)),
        ]
    })?;
    mgr.add_controller(c)?;

    let c = mgr.controller("owner-key").build(printer("owner-key"));
    c.watch::<ReplicaSet>(mgr.informers())?;
    c.watch_transformation_key_of(mgr.informers(), |p: &Pod| {
        ReconcileKey::new(p.namespace.as_str(), owner(p))
    })?;
    mgr.add_controller(c)?;

    let c = mgr.controller("parent-keys").build(printer("parent-keys"));
    c.watch::<ReplicaSet>(mgr.informers())?;
    c.watch_transformation_keys_of(mgr.informers(), |p: &Pod| {
        let ns = p.namespace.as_str();
        vec![
            ReconcileKey::new(ns, format!("{}-parent-1", owner(p))),
            ReconcileKey::new(ns, format!("{}-parent-2", owner(p))),
        ]
    })?;
    mgr.add_controller(c)?;

    // Initial state, then a few changes.
    replicasets.seed([ReplicaSet {
        namespace: "default".into(),
        name: "rs1".into(),
    }]);
    pods.seed([Pod {
        namespace: "default".into(),
        name: "rs1-abc".into(),
    }]);

    let stop = CancellationToken::new();
    let feeder = {
        let pods = Arc::clone(&pods);
        let stop = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            pods.apply(Pod {
                namespace: "default".into(),
                name: "rs1-def".into(),
            });
            pods.delete(ReconcileKey::new("default", "rs1-abc"));
            tokio::time::sleep(Duration::from_millis(300)).await;
            stop.cancel();
        })
    };

    // One time for the program; Ctrl-C also stops it.
    mgr.run(mgr.run_arguments().with_stop(stop)).await?;
    feeder.await?;
    Ok(())
}
