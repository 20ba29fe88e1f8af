//! Path safety predicate consulted before anything is listed or deleted.

use std::path::{Component, Path, PathBuf};

/// Decides whether a path must never be offered for cleanup.
pub trait SafetyCheck: Send + Sync {
    /// Returns `true` when `path` is protected.
    fn is_blocked(&self, path: &Path) -> bool;
}

/// System trees nothing inside of which is ever deleted.
const PROTECTED_TREES: &[&str] = &[
    "/bin",
    "/boot",
    "/dev",
    "/etc",
    "/lib",
    "/lib64",
    "/proc",
    "/sbin",
    "/sys",
    "/usr",
    "/var/lib",
    "/System",
    "/Library",
    "/Applications",
];

/// Blocklist of protected roots, exact paths and unsafe path shapes.
#[derive(Debug, Clone)]
pub struct PathBlocklist {
    trees: Vec<PathBuf>,
    exact: Vec<PathBuf>,
}

impl PathBlocklist {
    /// Blocklist with the built-in system trees and the user's home directory.
    #[must_use]
    pub fn system() -> Self {
        let mut exact = vec![PathBuf::from("/")];
        if let Some(home) = dirs::home_dir() {
            exact.push(home);
        }
        Self {
            trees: PROTECTED_TREES.iter().map(PathBuf::from).collect(),
            exact,
        }
    }

    /// Blocklist with no built-in entries, for tests and embedding.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            trees: Vec::new(),
            exact: Vec::new(),
        }
    }

    /// Protects `path` and everything beneath it.
    #[must_use]
    pub fn protect_tree(mut self, path: impl Into<PathBuf>) -> Self {
        self.trees.push(path.into());
        self
    }

    /// Protects `path` itself but not its contents.
    #[must_use]
    pub fn protect_exact(mut self, path: impl Into<PathBuf>) -> Self {
        self.exact.push(path.into());
        self
    }
}

impl SafetyCheck for PathBlocklist {
    fn is_blocked(&self, path: &Path) -> bool {
        if !path.is_absolute() {
            return true;
        }
        if path
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            return true;
        }
        if self.exact.iter().any(|exact| exact == path) {
            return true;
        }
        // A protected tree also blocks its ancestors: removing `/var` would
        // take `/var/lib` with it.
        self.trees
            .iter()
            .any(|tree| path.starts_with(tree) || tree.starts_with(path))
    }
}
