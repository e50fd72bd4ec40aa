//! # Run informers and controllers.
//!
//! [`run_informers_and_controllers`] is the process entry point of the
//! runtime. It owns every task it spawns and returns only once they have all
//! exited (or the grace period ran out).
//!
//! ## Phases
//! ```text
//! 1. start      spawn Source::run(token) per informer      → InformerStarted
//! 2. sync       join_all(wait_for_sync) under deadline     → CacheSynced (per kind)
//!                 └─ deadline hit → CacheSyncTimedOut, cancel informers,
//!                                   Err(CacheSyncTimeout { unsynced })
//! 3. controllers  Controller::start() per controller       → WatchRegistered*, ControllerStarted
//! 4. wait       stop token cancelled | OS signal           → ShutdownRequested
//! 5. shutdown   queue.shut_down() per controller, cancel informers
//! 6. grace      join everything within `grace`             → AllStoppedWithin
//!                 └─ grace hit → GraceExceeded, Err(GraceExceeded { stuck })
//! ```
//!
//! ## Rules
//! - No controller starts before every informer reported synced.
//! - Stop requested during sync skips the controller phase and returns `Ok`.
//! - Stuck entries are `controller:namespace/name` for keys still in flight.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::controller::ControllerRegistry;
use crate::core::{Config, shutdown};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::informer::InformerRegistry;
use crate::key::ObjectKind;

/// Parameters of one run.
#[derive(Clone, Debug)]
pub struct RunArguments {
    /// Cancel to request shutdown.
    pub stop: CancellationToken,
    /// Deadline for every informer's initial sync.
    pub cache_sync_timeout: Duration,
    /// Maximum wait for workers and informers after shutdown is requested.
    pub grace: Duration,
    /// Also stop on SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere).
    pub handle_signals: bool,
}

impl RunArguments {
    /// Arguments taken from `cfg`, with a fresh stop token.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            stop: CancellationToken::new(),
            cache_sync_timeout: cfg.cache_sync_timeout,
            grace: cfg.grace,
            handle_signals: cfg.handle_signals,
        }
    }

    /// Replaces the stop token.
    pub fn with_stop(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }
}

impl Default for RunArguments {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Starts every informer, waits for their caches, starts every controller and
/// blocks until shutdown is requested.
///
/// # Errors
/// - [`RuntimeError::CacheSyncTimeout`] if an informer did not sync in time;
///   no controller was started.
/// - [`RuntimeError::AlreadyStarted`] if a controller was started before.
/// - [`RuntimeError::GraceExceeded`] if tasks were still running after `grace`.
/// - [`RuntimeError::Signal`] if signal handlers could not be installed.
pub async fn run_informers_and_controllers(
    informers: &InformerRegistry,
    controllers: &ControllerRegistry,
    bus: &Bus,
    args: RunArguments,
) -> Result<(), RuntimeError> {
    if let Some(c) = controllers.iter().find(|c| c.is_started()) {
        return Err(RuntimeError::AlreadyStarted {
            controller: c.name().to_string(),
        });
    }

    debug!(
        informers = informers.len(),
        controllers = controllers.len(),
        "starting informers"
    );
    let informer_token = CancellationToken::new();
    let mut informer_set = JoinSet::new();
    let sources: Vec<_> = informers.sources().collect();
    for source in &sources {
        let source = Arc::clone(source);
        let token = informer_token.clone();
        bus.publish(Event::new(EventKind::InformerStarted).with_object_kind(source.kind()));
        informer_set.spawn(async move { source.run(token).await });
    }

    let pending: Mutex<BTreeSet<ObjectKind>> =
        Mutex::new(informers.kinds().into_iter().collect());
    let sync_all = join_all(sources.iter().map(|source| {
        let pending = &pending;
        async move {
            source.wait_for_sync().await;
            let kind = source.kind();
            pending.lock().unwrap_or_else(PoisonError::into_inner).remove(&kind);
            bus.publish(Event::new(EventKind::CacheSynced).with_object_kind(kind));
        }
    }));

    tokio::select! {
        synced = time::timeout(args.cache_sync_timeout, sync_all) => {
            if synced.is_err() {
                let unsynced: Vec<String> = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                error!(timeout = ?args.cache_sync_timeout, ?unsynced, "caches did not sync");
                bus.publish(
                    Event::new(EventKind::CacheSyncTimedOut).with_reason(unsynced.join("; ")),
                );
                informer_token.cancel();
                informer_set.shutdown().await;
                return Err(RuntimeError::CacheSyncTimeout {
                    timeout: args.cache_sync_timeout,
                    unsynced,
                });
            }
        }
        _ = args.stop.cancelled() => {
            bus.publish(Event::new(EventKind::ShutdownRequested));
            informer_token.cancel();
            let workers = JoinSet::new();
            return wait_all_with_grace(controllers, bus, args.grace, workers, informer_set).await;
        }
    }

    let mut worker_set = JoinSet::new();
    let mut started = Ok(());
    for c in controllers.iter() {
        if let Err(e) = c.start(&mut worker_set, bus) {
            started = Err(e);
            break;
        }
    }

    let stopped = match started {
        Ok(()) => shutdown::wait_for_stop(&args.stop, args.handle_signals)
            .await
            .map_err(RuntimeError::from),
        Err(e) => Err(e),
    };

    bus.publish(Event::new(EventKind::ShutdownRequested));
    for c in controllers.iter() {
        c.queue().shut_down();
    }
    informer_token.cancel();

    let drained = wait_all_with_grace(controllers, bus, args.grace, worker_set, informer_set).await;
    stopped.and(drained)
}

/// Joins workers, then informers, within `grace`.
async fn wait_all_with_grace(
    controllers: &ControllerRegistry,
    bus: &Bus,
    grace: Duration,
    mut workers: JoinSet<()>,
    mut informers: JoinSet<()>,
) -> Result<(), RuntimeError> {
    let done = async {
        while workers.join_next().await.is_some() {}
        while informers.join_next().await.is_some() {}
    };

    match time::timeout(grace, done).await {
        Ok(()) => {
            bus.publish(Event::new(EventKind::AllStoppedWithin));
            Ok(())
        }
        Err(_) => {
            let stuck: Vec<String> = controllers
                .iter()
                .flat_map(|c| {
                    c.queue()
                        .in_flight()
                        .into_iter()
                        .map(move |k| format!("{}:{k}", c.name()))
                })
                .collect();
            bus.publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
            Err(RuntimeError::GraceExceeded { grace, stuck })
        }
    }
}
