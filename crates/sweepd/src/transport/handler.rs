//! Connection handling abstraction for the daemon listener.

use std::os::unix::net::UnixStream;

/// Handles accepted socket connections.
///
/// The listener calls [`ConnectionHandler::handle`] on its own thread and does
/// not accept another connection until it returns.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serves a single connection to completion. Implementations should avoid
    /// panicking.
    fn handle(&self, stream: UnixStream);
}
