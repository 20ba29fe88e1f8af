//! Errors for request envelopes that cannot be dispatched.

use thiserror::Error;

/// Request-shape failures. The connection stays open after each one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The frame is JSON but not a request envelope.
    #[error("malformed request: {message}")]
    MalformedRequest {
        /// Decoder diagnostic.
        message: String,
    },
    /// The method is not part of the protocol.
    #[error("unknown method: {method}")]
    UnknownMethod {
        /// Method name as sent.
        method: String,
    },
    /// The params do not fit the method.
    #[error("invalid params: {message}")]
    InvalidParams {
        /// Decoder diagnostic.
        message: String,
    },
}

impl ProtocolError {
    /// Creates a malformed request error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    /// Creates an unknown method error.
    #[must_use]
    pub fn unknown_method(method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            method: method.into(),
        }
    }

    /// Creates an invalid params error.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }
}
