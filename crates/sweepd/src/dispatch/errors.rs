//! Error types for request dispatch failures.
//!
//! Each variant becomes an `error` response scoped to the request id; the
//! message a client sees is the variant's display text.

use std::io;

use thiserror::Error;

use crate::engine::EngineError;
use crate::protocol::ProtocolError;

/// Errors that reject a request before or instead of streaming.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request was malformed, named an unknown method or bad params.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The engine refused the operation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The method belongs to another layer.
    #[error("method '{method}' is not handled by the dispatcher")]
    Unroutable {
        /// Wire name of the method.
        method: &'static str,
    },

    /// The operation thread could not be started.
    #[error("failed to start operation: {source}")]
    Spawn {
        /// Error reported by the thread builder.
        #[source]
        source: io::Error,
    },
}

impl DispatchError {
    /// Creates an unroutable method error.
    #[must_use]
    pub const fn unroutable(method: &'static str) -> Self {
        Self::Unroutable { method }
    }
}
