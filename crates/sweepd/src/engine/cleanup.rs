//! Removal of scanned entries from disk.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use super::model::ScanEntry;
use super::safety::SafetyCheck;

/// Deletes a single scanned entry.
#[cfg_attr(test, mockall::automock)]
pub trait CleanupExecutor: Send + Sync {
    /// Removes `entry`, returning the bytes reclaimed.
    ///
    /// An entry that no longer exists counts as removed with nothing reclaimed.
    ///
    /// # Errors
    ///
    /// Returns [`RemovalError`] when the entry is protected or the filesystem
    /// refuses the removal.
    fn remove(&self, entry: &ScanEntry) -> Result<u64, RemovalError>;
}

/// Why an entry could not be removed.
#[derive(Debug, Error)]
pub enum RemovalError {
    /// The safety predicate rejected the path at deletion time.
    #[error("refusing to remove protected path '{}'", path.display())]
    Protected {
        /// Path the safety predicate rejected.
        path: PathBuf,
    },
    /// The filesystem reported an error.
    #[error("{source}")]
    Io {
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
}

impl From<io::Error> for RemovalError {
    fn from(source: io::Error) -> Self {
        Self::Io { source }
    }
}

/// Executor that deletes from the local filesystem.
pub struct FsCleanupExecutor {
    safety: Arc<dyn SafetyCheck>,
}

impl FsCleanupExecutor {
    /// Creates an executor that consults `safety` before every removal.
    #[must_use]
    pub const fn new(safety: Arc<dyn SafetyCheck>) -> Self {
        Self { safety }
    }
}

impl CleanupExecutor for FsCleanupExecutor {
    fn remove(&self, entry: &ScanEntry) -> Result<u64, RemovalError> {
        let path = entry.path();
        if self.safety.is_blocked(path) {
            return Err(RemovalError::Protected {
                path: path.to_path_buf(),
            });
        }

        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(error) => return Err(error.into()),
        };

        // `symlink_metadata` reports links as links, so a link to a
        // directory is unlinked rather than traversed.
        let removal = if metadata.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match removal {
            Ok(()) => Ok(entry.size()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(error) => Err(error.into()),
        }
    }
}
