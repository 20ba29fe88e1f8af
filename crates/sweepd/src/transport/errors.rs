//! Error types for socket listener operations.

use std::io;

use thiserror::Error;

/// Errors surfaced while binding or running the socket listener.
///
/// All of these are fatal to startup and reported on the process's own error
/// channel.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Something other than a socket occupies the path; it is left alone.
    #[error("socket path {path} exists and is not a socket")]
    PathConflict {
        /// Configured socket path.
        path: String,
    },
    /// A live daemon answered on the socket.
    #[error("another daemon is already listening on {path}")]
    AlreadyRunning {
        /// Configured socket path.
        path: String,
    },
    /// The socket path could not be inspected.
    #[error("failed to read metadata for unix socket {path}: {source}")]
    Metadata {
        /// Configured socket path.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
    /// A stale socket file could not be removed.
    #[error("failed to remove stale unix socket {path}: {source}")]
    StaleCleanup {
        /// Configured socket path.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
    /// The socket could not be bound.
    #[error("failed to bind unix listener at {path}: {source}")]
    Bind {
        /// Configured socket path.
        path: String,
        /// Error reported by `bind`.
        #[source]
        source: io::Error,
    },
    /// The socket could not be restricted to its owner.
    #[error("failed to restrict permissions on {path}: {source}")]
    Permissions {
        /// Configured socket path.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
    /// The listener could not be switched to non-blocking accepts.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Error reported by the socket.
        #[source]
        source: io::Error,
    },
    /// The accept loop thread could not be started.
    #[error("failed to spawn listener thread: {source}")]
    ThreadSpawn {
        /// Error reported by the thread builder.
        #[source]
        source: io::Error,
    },
    /// The accept loop panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}
