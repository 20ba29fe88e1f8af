//! Bookkeeping for operation threads that outlive their connection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::warn;

use super::DISPATCH_TARGET;
use super::errors::DispatchError;

/// Tracks spawned scan and cleanup threads so shutdown can wait for them.
#[derive(Debug, Clone, Default)]
pub struct OperationTracker {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl OperationTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` on a named thread.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Spawn`] if the thread cannot be created.
    pub fn spawn<F>(&self, name: &str, task: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(format!("sweepd-{name}"))
            .spawn(task)
            .map_err(|source| DispatchError::Spawn { source })?;
        let mut handles = self.lock();
        handles.retain(|running| !running.is_finished());
        handles.push(handle);
        Ok(())
    }

    /// Number of operation threads still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Blocks until every tracked thread has finished.
    pub fn wait(&self) {
        let handles = std::mem::take(&mut *self.lock());
        for handle in handles {
            if handle.join().is_err() {
                warn!(target: DISPATCH_TARGET, "operation thread panicked");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
