//! Termination signal handling.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{info, warn};

use crate::transport::ServerControl;

use super::PROCESS_TARGET;

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Starts watching for shutdown requests, stopping `control` when one
    /// arrives.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the watcher cannot be installed.
    fn install(&self, control: Arc<ServerControl>) -> Result<SignalWatcher, ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The watcher thread could not be started.
    #[error("failed to spawn signal watcher: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Running signal watcher. Disarming it unregisters the handlers.
#[derive(Default)]
pub struct SignalWatcher {
    handle: Option<Handle>,
    thread: Option<JoinHandle<()>>,
}

impl SignalWatcher {
    /// Watcher that never fires, for embedders that stop the daemon themselves.
    #[must_use]
    pub const fn inert() -> Self {
        Self {
            handle: None,
            thread: None,
        }
    }

    /// Stops watching and waits for the watcher thread.
    pub fn disarm(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: PROCESS_TARGET, "signal watcher panicked");
        }
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Shutdown listener that waits for termination signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl SystemShutdownSignal {
    /// Builds a signal listener.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn install(&self, control: Arc<ServerControl>) -> Result<SignalWatcher, ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("sweepd-signals".into())
            .spawn(move || {
                // Ends without a signal once the handle is closed.
                if let Some(signal) = signals.forever().next() {
                    info!(target: PROCESS_TARGET, signal, "shutdown signal received");
                    control.request_shutdown();
                }
            })
            .map_err(|source| ShutdownError::Spawn { source })?;
        Ok(SignalWatcher {
            handle: Some(handle),
            thread: Some(thread),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_watcher_leaves_the_server_running() {
        let control = Arc::new(ServerControl::new());
        let watcher = SystemShutdownSignal::new()
            .install(Arc::clone(&control))
            .expect("install watcher");
        watcher.disarm();
        assert!(!control.is_stopping());
    }

    #[test]
    fn inert_watcher_disarms_without_a_thread() {
        SignalWatcher::inert().disarm();
    }
}
