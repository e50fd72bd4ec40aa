//! Error types used by the keyvisor runtime and reconcilers.
//!
//! This module defines three enums:
//!
//! - [`SetupError`]: programmer errors raised while wiring informers and controllers.
//! - [`RuntimeError`]: errors raised by the run loop itself.
//! - [`ReconcileError`]: errors raised by a single reconcile attempt.
//!
//! All of them provide `as_label` (stable snake_case label for logs/metrics)
//! and `as_message`.

use std::time::Duration;
use thiserror::Error;

use crate::key::ObjectKind;

/// # Errors produced while wiring the runtime.
///
/// These are setup-time programmer errors; they surface immediately from the
/// call that caused them and are meant to abort setup.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// A controller tried to watch a kind that has no registered informer.
    #[error("controller {controller:?} cannot watch {kind}: no informer registered for this kind")]
    UnknownKind {
        /// Kind that was requested.
        kind: ObjectKind,
        /// Controller that requested it.
        controller: String,
    },

    /// Lookup of a kind that has no registered informer.
    #[error("no informer registered for {kind}")]
    NotFound {
        /// Kind that was looked up.
        kind: ObjectKind,
    },

    /// An informer is already registered for this kind.
    #[error("informer for {kind} already registered")]
    DuplicateRegistration {
        /// Kind that was registered twice.
        kind: ObjectKind,
    },

    /// The kind is registered, but under a different Rust object type.
    #[error("informer for {kind} is not an informer of {expected}")]
    KindMismatch {
        /// Kind that was looked up.
        kind: ObjectKind,
        /// Rust type the caller asked for.
        expected: &'static str,
    },

    /// The same controller instance was added twice.
    #[error("controller {controller:?} already added")]
    DuplicateController {
        /// Name of the controller.
        controller: String,
    },
}

impl SetupError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use keyvisor::{ObjectKind, SetupError};
    ///
    /// let err = SetupError::NotFound { kind: ObjectKind::new("", "v1", "Pod") };
    /// assert_eq!(err.as_label(), "setup_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SetupError::UnknownKind { .. } => "setup_unknown_kind",
            SetupError::NotFound { .. } => "setup_not_found",
            SetupError::DuplicateRegistration { .. } => "setup_duplicate_registration",
            SetupError::KindMismatch { .. } => "setup_kind_mismatch",
            SetupError::DuplicateController { .. } => "setup_duplicate_controller",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SetupError::UnknownKind { kind, controller } => {
                format!("unknown kind {kind} for controller={controller}")
            }
            SetupError::NotFound { kind } => format!("not found: {kind}"),
            SetupError::DuplicateRegistration { kind } => format!("duplicate informer: {kind}"),
            SetupError::KindMismatch { kind, expected } => {
                format!("kind mismatch: {kind} is not {expected}")
            }
            SetupError::DuplicateController { controller } => {
                format!("duplicate controller: {controller}")
            }
        }
    }
}

/// # Errors produced by the run loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Informer caches did not synchronize before the deadline; no controller was started.
    #[error("caches not synced within {timeout:?}; unsynced: {unsynced:?}")]
    CacheSyncTimeout {
        /// Configured deadline.
        timeout: Duration,
        /// Kinds whose informers had not synced.
        unsynced: Vec<String>,
    },

    /// Shutdown grace period was exceeded; some reconciles were still in flight.
    #[error("shutdown timeout {grace:?} exceeded; in flight: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// `controller:key` pairs still being reconciled.
        stuck: Vec<String>,
    },

    /// A controller was started a second time.
    #[error("controller {controller:?} already started")]
    AlreadyStarted {
        /// Name of the controller.
        controller: String,
    },

    /// Registering OS signal handlers failed.
    #[error("signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use keyvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::CacheSyncTimeout { .. } => "runtime_cache_sync_timeout",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::AlreadyStarted { .. } => "runtime_already_started",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::CacheSyncTimeout { timeout, unsynced } => {
                format!("cache sync timed out after {timeout:?}; unsynced={unsynced:?}")
            }
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; in flight={stuck:?}")
            }
            RuntimeError::AlreadyStarted { controller } => {
                format!("already started: {controller}")
            }
            RuntimeError::Signal(e) => format!("signal: {e}"),
        }
    }
}

/// # Errors produced by one reconcile attempt.
///
/// Every variant is handled the same way by the worker: the key is re-queued
/// through the controller's rate limiter and retried until it succeeds or the
/// runtime shuts down.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Reconcile failed; the key will be retried with backoff.
    #[error("reconcile failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Reconcile exceeded the controller's per-attempt timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// Reconcile panicked; the panic was contained by the worker.
    #[error("reconcile panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },
}

impl ReconcileError {
    /// Shorthand for [`ReconcileError::Fail`].
    ///
    /// ```
    /// use keyvisor::ReconcileError;
    ///
    /// let err = ReconcileError::fail("replica set not found");
    /// assert_eq!(err.to_string(), "reconcile failed: replica set not found");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        ReconcileError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ReconcileError::Fail { .. } => "reconcile_failed",
            ReconcileError::Timeout { .. } => "reconcile_timeout",
            ReconcileError::Panicked { .. } => "reconcile_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ReconcileError::Fail { error } => format!("error: {error}"),
            ReconcileError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            ReconcileError::Panicked { info } => format!("panic: {info}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_mentions_controller_and_kind() {
        let err = SetupError::UnknownKind {
            kind: ObjectKind::new("", "v1", "Pod"),
            controller: "rs".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"rs\""), "{msg}");
        assert!(msg.contains("Kind=Pod"), "{msg}");
        assert_eq!(err.as_label(), "setup_unknown_kind");
    }

    #[test]
    fn cache_sync_timeout_lists_unsynced() {
        let err = RuntimeError::CacheSyncTimeout {
            timeout: Duration::from_secs(1),
            unsynced: vec!["/v1, Kind=Pod".into()],
        };
        assert!(err.as_message().contains("Kind=Pod"));
        assert_eq!(err.as_label(), "runtime_cache_sync_timeout");
    }
}
