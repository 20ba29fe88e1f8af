//! Scan sources inventory one filesystem location each.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use walkdir::WalkDir;

use super::cancel::CancelToken;
use super::model::{CategoryInfo, CategoryResult, RiskLevel, ScanEntry};
use super::safety::SafetyCheck;

/// A location the engine can scan for reclaimable entries.
pub trait ScanSource: Send + Sync {
    /// Category this source reports under.
    fn info(&self) -> &CategoryInfo;

    /// Inventories the location.
    ///
    /// Implementations may stop early once `cancel` fires; the engine
    /// discards the result of a cancelled scan.
    ///
    /// # Errors
    ///
    /// Returns [`ScanSourceError`] when the location cannot be inventoried at
    /// all. Unreadable descendants belong in the result's permission issues.
    fn scan(&self, cancel: &CancelToken) -> Result<CategoryResult, ScanSourceError>;
}

/// Failure of a whole scan source.
#[derive(Debug, Error)]
pub enum ScanSourceError {
    /// The source's root could not be listed.
    #[error("failed to list '{path}': {source}")]
    List {
        /// Root that could not be listed.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
    /// The source cannot run on this system.
    #[error("{message}")]
    Unavailable {
        /// Why the source cannot run.
        message: String,
    },
}

impl ScanSourceError {
    /// Creates an unavailable-source error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Lists the immediate children of one directory as cleanup entries.
pub struct DirectoryScanSource {
    info: CategoryInfo,
    root: PathBuf,
    risk: RiskLevel,
    safety: Arc<dyn SafetyCheck>,
}

impl DirectoryScanSource {
    /// Creates a source for `root`.
    #[must_use]
    pub fn new(
        info: CategoryInfo,
        root: impl Into<PathBuf>,
        risk: RiskLevel,
        safety: Arc<dyn SafetyCheck>,
    ) -> Self {
        Self {
            info,
            root: root.into(),
            risk,
            safety,
        }
    }

    /// Directory whose children are listed.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn describe(&self, path: &Path, is_dir: bool) -> String {
        let kind = if is_dir { "directory" } else { "file" };
        let name = path
            .file_name()
            .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy());
        format!("{} {kind} '{name}'", self.info.description)
    }
}

impl ScanSource for DirectoryScanSource {
    fn info(&self) -> &CategoryInfo {
        &self.info
    }

    fn scan(&self, cancel: &CancelToken) -> Result<CategoryResult, ScanSourceError> {
        let mut permission_issues = Vec::new();
        let listing = match fs::read_dir(&self.root) {
            Ok(listing) => listing,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(CategoryResult::new(&self.info, Vec::new(), permission_issues));
            }
            Err(error) if error.kind() == io::ErrorKind::PermissionDenied => {
                permission_issues.push(self.root.clone());
                return Ok(CategoryResult::new(&self.info, Vec::new(), permission_issues));
            }
            Err(source) => {
                return Err(ScanSourceError::List {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut entries = Vec::new();
        for listed in listing {
            if cancel.is_cancelled() {
                break;
            }
            let Ok(child) = listed else {
                permission_issues.push(self.root.clone());
                continue;
            };
            let path = child.path();
            if self.safety.is_blocked(&path) {
                continue;
            }
            let is_dir = child.file_type().is_ok_and(|kind| kind.is_dir());
            let size = measure(&path, &mut permission_issues);
            let description = self.describe(&path, is_dir);
            entries.push(ScanEntry::new(path, description, size, self.risk));
        }

        Ok(CategoryResult::new(&self.info, entries, permission_issues))
    }
}

/// Sums file lengths beneath `path` without following symlinks.
fn measure(path: &Path, permission_issues: &mut Vec<PathBuf>) -> u64 {
    let mut total = 0_u64;
    for walked in WalkDir::new(path).follow_links(false) {
        match walked {
            Ok(entry) if entry.file_type().is_file() => {
                total += entry.metadata().map_or(0, |metadata| metadata.len());
            }
            Ok(_) => {}
            Err(error) => {
                let denied = error
                    .io_error()
                    .is_some_and(|io| io.kind() == io::ErrorKind::PermissionDenied);
                if denied {
                    let failed = error.path().unwrap_or(path).to_path_buf();
                    permission_issues.push(failed);
                }
            }
        }
    }
    total
}
