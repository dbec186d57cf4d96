//! # Shutdown signalling.
//!
//! Two sources can end a worker:
//! - the `shutdown` command, through [`ShutdownSignal::request`] carrying an exit code;
//! - OS termination signals, through [`wait_for_shutdown_signal`] (opt-in, exit code `0`).
//!
//! **Unix platforms:** `SIGINT`, `SIGTERM`, `SIGQUIT`.
//! **Windows platforms:** `Ctrl-C` via [`tokio::signal::ctrl_c`].

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// Cancellation token paired with the exit code of the first shutdown request.
///
/// Clones share state. The first [`request`](Self::request) fixes the exit code;
/// later requests still cancel but do not change it.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    code: Arc<OnceLock<i32>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `token` as the shutdown token (e.g. a child of a pool-wide token).
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            code: Arc::default(),
        }
    }

    /// Requests shutdown with `code`. Returns `true` if this request set the code.
    pub fn request(&self, code: i32) -> bool {
        let first = self.code.set(code).is_ok();
        self.token.cancel();
        first
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Exit code of the first request; `0` when cancelled from outside.
    pub fn exit_code(&self) -> i32 {
        self.code.get().copied().unwrap_or(0)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Completes once shutdown is requested.
    pub async fn requested(&self) {
        self.token.cancelled().await
    }
}

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Returns `Ok(())` when Ctrl-C is received, or `Err` if registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
