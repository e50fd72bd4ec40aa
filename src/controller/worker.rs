//! # Reconcile workers.
//!
//! Every worker of a controller runs the same loop over the shared queue:
//!
//! ```text
//! loop {
//!   ├─► queue.get()            None → exit (queue shut down)
//!   ├─► publish ReconcileStarting{ key, attempt }
//!   ├─► reconcile_once(key)    catch_unwind + optional timeout
//!   │       ├─ Ok  ──► queue.forget(key)
//!   │       │          publish ReconcileSucceeded
//!   │       └─ Err ──► publish ReconcileFailed{ error }
//!   │                  delay = queue.add_rate_limited(key)
//!   │                  publish RequeueScheduled{ delay }
//!   └─► queue.done(key)
//! }
//! ```
//!
//! ## Rules
//! - One attempt per `get`; retries go back through the queue, so other keys
//!   are never blocked by a failing one.
//! - `attempt` is 1 + the key's consecutive failures.
//! - A reconcile that panics or times out counts as a failure.
//! - An attempt already running when shutdown starts is not interrupted.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;

use crate::controller::Controller;
use crate::error::ReconcileError;
use crate::events::{Bus, Event, EventKind};
use crate::key::ReconcileKey;
use crate::reconciler::Reconcile;

/// Runs one worker until the controller's queue shuts down.
pub(super) async fn run(ctrl: Arc<Controller>, bus: Bus) {
    while let Some(key) = ctrl.queue.get().await {
        let attempt = ctrl.queue.num_requeues(&key).saturating_add(1);
        bus.publish(event(&ctrl, EventKind::ReconcileStarting, &key, attempt));

        let res = reconcile_once(ctrl.reconciler.as_ref(), key.clone(), ctrl.reconcile_timeout).await;
        match res {
            Ok(()) => {
                ctrl.queue.forget(&key);
                bus.publish(event(&ctrl, EventKind::ReconcileSucceeded, &key, attempt));
            }
            Err(e) => {
                bus.publish(
                    event(&ctrl, EventKind::ReconcileFailed, &key, attempt)
                        .with_reason(e.as_message()),
                );
                let delay = ctrl.queue.add_rate_limited(key.clone());
                bus.publish(
                    event(&ctrl, EventKind::RequeueScheduled, &key, attempt).with_delay(delay),
                );
            }
        }
        ctrl.queue.done(&key);
    }
}

/// Executes one reconcile attempt. Panics become [`ReconcileError::Panicked`],
/// an elapsed `timeout` becomes [`ReconcileError::Timeout`].
pub(super) async fn reconcile_once(
    reconciler: &dyn Reconcile,
    key: ReconcileKey,
    timeout: Option<Duration>,
) -> Result<(), ReconcileError> {
    let attempt = AssertUnwindSafe(reconciler.reconcile(key)).catch_unwind();

    let res = match timeout.filter(|d| !d.is_zero()) {
        Some(dur) => match time::timeout(dur, attempt).await {
            Ok(r) => r,
            Err(_elapsed) => return Err(ReconcileError::Timeout { timeout: dur }),
        },
        None => attempt.await,
    };

    res.unwrap_or_else(|panic| {
        Err(ReconcileError::Panicked {
            info: crate::panic_message(panic.as_ref()),
        })
    })
}

fn event(ctrl: &Controller, kind: EventKind, key: &ReconcileKey, attempt: u32) -> Event {
    Event::new(kind)
        .with_controller(Arc::clone(&ctrl.name))
        .with_key(key)
        .with_attempt(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Semaphore;
    use tokio::task::JoinSet;

    use crate::policies::{BackoffPolicy, JitterPolicy};
    use crate::queue::ItemBackoffLimiter;
    use crate::reconciler::ReconcileFn;

    struct Flaky {
        fail_first: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Reconcile for Flaky {
        async fn reconcile(&self, _key: ReconcileKey) -> Result<(), ReconcileError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(ReconcileError::fail(format!("attempt {n} failed")))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn panics_become_errors() {
        let r = ReconcileFn::new(|k: ReconcileKey| async move {
            if k.name() == "k" {
                panic!("reconciler bug");
            }
            Ok::<_, ReconcileError>(())
        });
        let err = reconcile_once(&r, ReconcileKey::cluster("k"), None)
            .await
            .expect_err("panic");
        assert_eq!(
            err,
            ReconcileError::Panicked {
                info: "reconciler bug".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_reconcile_times_out() {
        let r = ReconcileFn::new(|_k: ReconcileKey| async {
            time::sleep(Duration::from_secs(10)).await;
            Ok::<_, ReconcileError>(())
        });
        let err = reconcile_once(&r, ReconcileKey::cluster("k"), Some(Duration::from_secs(1)))
            .await
            .expect_err("timeout");
        assert_eq!(
            err,
            ReconcileError::Timeout {
                timeout: Duration::from_secs(1)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_retried_with_growing_delay_then_forgotten() {
        let backoff = BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        let flaky = Arc::new(Flaky {
            fail_first: 3,
            calls: AtomicU32::new(0),
        });
        let ctrl = Controller::builder("flaky")
            .rate_limiter(Arc::new(ItemBackoffLimiter::new(backoff)))
            .build(flaky.clone());

        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let mut set = JoinSet::new();
        ctrl.start(&mut set, &bus).expect("start");

        let key = ReconcileKey::new("default", "rs1");
        ctrl.queue().add(key.clone());

        let mut delays = Vec::new();
        loop {
            let ev = rx.recv().await.expect("event");
            match ev.kind {
                EventKind::RequeueScheduled => {
                    delays.push(ev.delay_ms.unwrap_or_default());
                }
                EventKind::ReconcileSucceeded => {
                    assert_eq!(ev.attempt, Some(4));
                    break;
                }
                _ => {}
            }
        }

        assert_eq!(delays, vec![10, 20, 40]);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 4);
        assert_eq!(ctrl.queue().num_requeues(&key), 0);

        ctrl.queue().shut_down();
        while set.join_next().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn failure_and_fresh_add_collapse_into_one_retry() {
        let backoff = BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        let gate = Arc::new(Semaphore::new(0));
        let calls = Arc::new(AtomicU32::new(0));
        let reconciler = {
            let gate = Arc::clone(&gate);
            let calls = Arc::clone(&calls);
            ReconcileFn::arc(move |_key: ReconcileKey| {
                let gate = Arc::clone(&gate);
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n > 0 {
                        return Ok(());
                    }
                    let _permit = gate
                        .acquire()
                        .await
                        .map_err(|e| ReconcileError::fail(e.to_string()))?;
                    Err(ReconcileError::fail("stale read"))
                }
            })
        };
        let ctrl = Controller::builder("collapse")
            .rate_limiter(Arc::new(ItemBackoffLimiter::new(backoff)))
            .build(reconciler);

        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let mut set = JoinSet::new();
        ctrl.start(&mut set, &bus).expect("start");

        let key = ReconcileKey::new("default", "rs1");
        ctrl.queue().add(key.clone());
        while rx.recv().await.expect("event").kind != EventKind::ReconcileStarting {}

        ctrl.queue().add(key.clone());
        gate.add_permits(1);
        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ctrl.queue().delayed_len(), 0);
        assert!(ctrl.queue().is_empty());
        assert_eq!(ctrl.queue().num_requeues(&key), 0);

        ctrl.queue().shut_down();
        while set.join_next().await.is_some() {}
    }
}
