//! # Stop conditions for the run loop.
//!
//! [`wait_for_stop`] completes when the caller's stop token is cancelled or,
//! if enabled, when the process receives a termination signal.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT`
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]

use tokio_util::sync::CancellationToken;

/// Waits for `stop` to be cancelled, or for a termination signal if `signals` is set.
///
/// Returns `Err` if signal registration fails.
pub(crate) async fn wait_for_stop(
    stop: &CancellationToken,
    signals: bool,
) -> std::io::Result<()> {
    if !signals {
        stop.cancelled().await;
        return Ok(());
    }
    tokio::select! {
        _ = stop.cancelled() => Ok(()),
        res = wait_for_shutdown_signal() => res,
    }
}

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_once_stop_is_cancelled() {
        let stop = CancellationToken::new();
        stop.cancel();
        wait_for_stop(&stop, false).await.expect("stopped");
        wait_for_stop(&stop, true).await.expect("stopped");
    }
}
