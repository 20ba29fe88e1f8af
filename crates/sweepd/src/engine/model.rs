//! Values produced by scan sources and returned by engine operations.

use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

/// How confident the scanner is that removing an entry is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Regenerated automatically (caches, build output).
    Safe,
    /// Recoverable but possibly wanted (trash, old downloads).
    Moderate,
    /// May hold data another program still expects.
    Risky,
}

/// A single reclaimable item found by a scan source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEntry {
    #[serde(serialize_with = "serialize_path")]
    path: PathBuf,
    description: String,
    size: u64,
    risk: RiskLevel,
}

impl ScanEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        description: impl Into<String>,
        size: u64,
        risk: RiskLevel,
    ) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
            size,
            risk,
        }
    }

    /// Location on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Size in bytes at scan time.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Risk classification.
    #[must_use]
    pub const fn risk(&self) -> RiskLevel {
        self.risk
    }
}

/// Static description of a scan category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryInfo {
    /// Stable identifier used in selections.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Whether front-ends should preselect the category.
    pub default_enabled: bool,
}

impl CategoryInfo {
    /// Creates a category description.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        default_enabled: bool,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            default_enabled,
        }
    }
}

/// Outcome of scanning one category.
///
/// Entries are kept sorted by size, largest first, and `total_size` always
/// equals the sum of their sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryResult {
    category: String,
    description: String,
    entries: Vec<ScanEntry>,
    total_size: u64,
    #[serde(serialize_with = "serialize_paths")]
    permission_issues: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CategoryResult {
    /// Builds a result, ordering entries by descending size.
    #[must_use]
    pub fn new(
        info: &CategoryInfo,
        mut entries: Vec<ScanEntry>,
        permission_issues: Vec<PathBuf>,
    ) -> Self {
        entries.sort_by(|left, right| {
            right
                .size
                .cmp(&left.size)
                .then_with(|| left.path.cmp(&right.path))
        });
        let total_size = entries.iter().map(ScanEntry::size).sum();
        Self {
            category: info.id.clone(),
            description: info.description.clone(),
            entries,
            total_size,
            permission_issues,
            error: None,
        }
    }

    /// Records a source that failed outright.
    #[must_use]
    pub fn failed(info: &CategoryInfo, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(info, Vec::new(), Vec::new())
        }
    }

    /// Category identifier.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Entries, largest first.
    #[must_use]
    pub fn entries(&self) -> &[ScanEntry] {
        &self.entries
    }

    /// Sum of entry sizes.
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Paths the source could not read.
    #[must_use]
    pub fn permission_issues(&self) -> &[PathBuf] {
        &self.permission_issues
    }

    /// Failure message when the source could not run.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Which categories an operation covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Every registered category.
    #[default]
    All,
    /// Only the named categories.
    Categories(Vec<String>),
}

impl Selection {
    /// Reports whether `category` is selected.
    #[must_use]
    pub fn includes(&self, category: &str) -> bool {
        match self {
            Self::All => true,
            Self::Categories(ids) => ids.iter().any(|id| id == category),
        }
    }
}

/// Progress reported around each scan source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanEvent {
    /// Category being scanned.
    pub category: String,
    /// Completed share of the selected sources, from 0.0 to 1.0.
    pub fraction: f64,
}

/// Progress reported after each cleanup item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupEvent {
    /// Entry just processed.
    #[serde(serialize_with = "serialize_path")]
    pub path: PathBuf,
    /// One-based position of the entry.
    pub index: usize,
    /// Number of entries in the cleanup.
    pub total: usize,
}

/// Completed scan, bound to the token that authorises its cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Per-category results in scan order.
    pub categories: Vec<CategoryResult>,
    /// Sum of every category's total.
    pub total_size: u64,
    /// One-time token for a subsequent cleanup.
    pub token: String,
}

/// A single entry that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalFailure {
    /// Entry that failed.
    #[serde(serialize_with = "serialize_path")]
    pub path: PathBuf,
    /// Why it failed.
    pub error: String,
}

/// Final tally of a cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupTally {
    /// Entries removed, including ones already gone.
    pub removed_count: usize,
    /// Entries that could not be removed.
    pub failed_count: usize,
    /// Bytes reclaimed by removed entries.
    pub bytes_freed: u64,
    /// Details for each failed entry.
    pub failures: Vec<RemovalFailure>,
}

fn serialize_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

fn serialize_paths<S: Serializer>(paths: &[PathBuf], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(paths.iter().map(|path| path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> CategoryInfo {
        CategoryInfo::new("user-cache", "Application caches", true)
    }

    #[test]
    fn results_sort_entries_by_descending_size() {
        let entries = vec![
            ScanEntry::new("/c/small", "small", 10, RiskLevel::Safe),
            ScanEntry::new("/c/large", "large", 300, RiskLevel::Safe),
            ScanEntry::new("/c/medium", "medium", 50, RiskLevel::Moderate),
        ];
        let result = CategoryResult::new(&info(), entries, Vec::new());
        let sizes: Vec<u64> = result.entries().iter().map(ScanEntry::size).collect();
        assert_eq!(sizes, vec![300, 50, 10]);
        assert_eq!(result.total_size(), 360);
    }

    #[test]
    fn failed_results_carry_the_error_and_no_entries() {
        let result = CategoryResult::failed(&info(), "cache directory unavailable");
        assert!(result.entries().is_empty());
        assert_eq!(result.total_size(), 0);
        assert_eq!(result.error(), Some("cache directory unavailable"));
    }

    #[test]
    fn selection_all_includes_everything() {
        assert!(Selection::All.includes("anything"));
        let some = Selection::Categories(vec!["trash".to_owned()]);
        assert!(some.includes("trash"));
        assert!(!some.includes("user-cache"));
    }

    #[test]
    fn entries_serialize_with_snake_case_risk() {
        let entry = ScanEntry::new("/c/a", "cache", 7, RiskLevel::Moderate);
        let value = serde_json::to_value(&entry).expect("serialize entry");
        assert_eq!(
            value,
            serde_json::json!({
                "path": "/c/a",
                "description": "cache",
                "size": 7,
                "risk": "moderate"
            })
        );
    }
}
