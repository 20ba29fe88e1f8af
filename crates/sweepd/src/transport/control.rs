//! Server-wide shutdown coordination.

use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::engine::CancelToken;

use super::LISTENER_TARGET;

/// Shared stop switch for the accept loop and the active connection.
///
/// [`ServerControl::request_shutdown`] is idempotent and may be called from
/// any thread: a client `shutdown`, a signal watcher or a dropped listener
/// handle.
#[derive(Debug, Default)]
pub struct ServerControl {
    stopping: AtomicBool,
    lifetime: CancelToken,
    active: Mutex<Option<UnixStream>>,
}

impl ServerControl {
    /// Creates a running server control.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token every connection context derives from.
    #[must_use]
    pub const fn lifetime(&self) -> &CancelToken {
        &self.lifetime
    }

    /// Reports whether shutdown has been requested.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Stops accepting, cancels every connection and closes the active one.
    pub fn request_shutdown(&self) {
        self.mark_stopping();
        self.close_active();
    }

    /// Stops accepting and cancels every connection context.
    ///
    /// The active stream stays open so a final reply can still be written.
    pub(crate) fn mark_stopping(&self) {
        if !self.stopping.swap(true, Ordering::SeqCst) {
            info!(target: LISTENER_TARGET, "shutdown requested");
        }
        self.lifetime.cancel();
    }

    /// Shuts the active stream down so a blocked read returns.
    pub(crate) fn close_active(&self) {
        if let Some(stream) = self.active_slot().as_ref()
            && let Err(error) = stream.shutdown(Shutdown::Both)
        {
            debug!(target: LISTENER_TARGET, %error, "active connection already closed");
        }
    }

    /// Records the connection being served so shutdown can close it.
    pub(crate) fn attach(&self, stream: UnixStream) {
        *self.active_slot() = Some(stream);
    }

    /// Forgets the connection being served.
    pub(crate) fn detach(&self) {
        self.active_slot().take();
    }

    fn active_slot(&self) -> MutexGuard<'_, Option<UnixStream>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
