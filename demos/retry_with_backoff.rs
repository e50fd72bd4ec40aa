//! # Example: retry_with_backoff
//!
//! A reconciler that fails twice for every key before succeeding, showing how
//! failed keys go back through the work queue with per-key backoff while other
//! keys keep flowing.
//!
//! ## Flow
//! ```text
//! worker
//!   ├─► get() → default/db          publish(ReconcileStarting, attempt=1)
//!   ├─► reconcile → Err("boom #1")  publish(ReconcileFailed)
//!   ├─► add_rate_limited            publish(RequeueScheduled{delay≈100ms})
//!   ├─► done()
//!   │   ... 100ms later the delay loop re-queues default/db
//!   ├─► get() → default/db          attempt=2 → Err → RequeueScheduled{delay≈200ms}
//!   ├─► get() → default/db          attempt=3 → Ok
//!   └─► forget()                    publish(ReconcileSucceeded, attempt=3)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example retry_with_backoff
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keyvisor::{
    BackoffPolicy, Config, JitterPolicy, LogWriter, Manager, MemoryInformer, Object, ObjectKind,
    ReconcileError, ReconcileFn, ReconcileKey, Subscribe,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct Service {
    name: String,
}

impl Object for Service {
    const KIND: ObjectKind = ObjectKind::new("", "v1", "Service");
    fn namespace(&self) -> &str {
        "default"
    }
    fn name(&self) -> &str {
        &self.name
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // 1. Backoff: 100ms, 200ms, 400ms ... capped at 5s; equal jitter picks from [d/2, d].
    let cfg = Config {
        grace: Duration::from_secs(5),
        backoff: BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        },
        ..Config::default()
    };

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let mut mgr = Manager::builder(cfg).with_subscribers(subs).build();

    let services = MemoryInformer::<Service>::arc();
    services.seed(["db", "cache", "web"].map(|name| Service { name: name.into() }));
    mgr.register_informer::<Service, _>(services.clone())?;

    // 2. Fail twice per key, then succeed; stop once every key succeeded.
    let attempts: Arc<Mutex<HashMap<ReconcileKey, u32>>> = Arc::default();
    let stop = CancellationToken::new();
    let reconciler = {
        let attempts = Arc::clone(&attempts);
        let stop = stop.clone();
        ReconcileFn::arc(move |key: ReconcileKey| {
            let attempts = Arc::clone(&attempts);
            let stop = stop.clone();
            async move {
                let (attempt, all_done) = {
                    let mut map = attempts
                        .lock()
                        .map_err(|e| ReconcileError::fail(e.to_string()))?;
                    let n = map.entry(key.clone()).or_insert(0);
                    *n += 1;
                    let attempt = *n;
                    (attempt, map.len() == 3 && map.values().all(|n| *n >= 3))
                };

                if attempt <= 2 {
                    println!("[{key}] simulated failure #{attempt}");
                    return Err(ReconcileError::fail(format!("boom #{attempt}")));
                }
                println!("[{key}] success on attempt {attempt}");
                if all_done {
                    stop.cancel();
                }
                Ok::<(), ReconcileError>(())
            }
        })
    };

    let c = mgr.controller("services").workers(2).build(reconciler);
    c.watch::<Service>(mgr.informers())?;
    mgr.add_controller(c)?;

    // 3. Run until every key succeeded (or Ctrl-C).
    mgr.run(mgr.run_arguments().with_stop(stop)).await?;
    Ok(())
}
