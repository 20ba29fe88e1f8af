//! Request-scoped failures raised by engine operations.

use thiserror::Error;

/// Errors that fail a whole scan or cleanup request.
///
/// Per-source and per-item failures never surface here; they are recorded in
/// the operation's result instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The presented token is absent, stale or already redeemed.
    #[error("invalid token")]
    InvalidToken,
    /// Another scan or cleanup holds the engine.
    #[error("operation in progress")]
    OperationInProgress,
    /// The selection names a category the registry does not know.
    #[error("unsupported selection: unknown category '{category}'")]
    UnsupportedSelection {
        /// Category id as requested.
        category: String,
    },
    /// The selection is an empty list of categories.
    #[error("unsupported selection: no categories named")]
    EmptySelection,
    /// A thread panicked while holding engine state.
    #[error("engine state is poisoned")]
    StatePoisoned,
}

impl EngineError {
    /// Creates an unsupported selection error.
    #[must_use]
    pub fn unsupported_selection(category: impl Into<String>) -> Self {
        Self::UnsupportedSelection {
            category: category.into(),
        }
    }
}
