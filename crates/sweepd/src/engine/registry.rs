//! Ordered registry of scan sources and the built-in default set.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::errors::EngineError;
use super::model::{CategoryInfo, RiskLevel, Selection};
use super::safety::SafetyCheck;
use super::source::{DirectoryScanSource, ScanSource};
use super::ENGINE_TARGET;

/// Raised when two sources claim the same category id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("category '{id}' is already registered")]
pub struct DuplicateCategory {
    /// Conflicting id.
    pub id: String,
}

/// Scan sources in registration order, unique by category id.
#[derive(Clone, Default)]
pub struct ScanRegistry {
    sources: Vec<Arc<dyn ScanSource>>,
}

impl ScanRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateCategory`] if a source with the same id exists.
    pub fn register(&mut self, source: Arc<dyn ScanSource>) -> Result<(), DuplicateCategory> {
        let id = &source.info().id;
        if self.sources.iter().any(|known| &known.info().id == id) {
            return Err(DuplicateCategory { id: id.clone() });
        }
        self.sources.push(source);
        Ok(())
    }

    /// Static descriptions of every category, in registration order.
    #[must_use]
    pub fn categories(&self) -> Vec<CategoryInfo> {
        self.sources
            .iter()
            .map(|source| source.info().clone())
            .collect()
    }

    /// Checks that every id named by `selection` is registered.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptySelection`] for an empty id list and
    /// [`EngineError::UnsupportedSelection`] for the first unknown id.
    pub fn validate(&self, selection: &Selection) -> Result<(), EngineError> {
        let Selection::Categories(ids) = selection else {
            return Ok(());
        };
        if ids.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        ids.iter()
            .find(|id| !self.sources.iter().any(|source| &source.info().id == *id))
            .map_or(Ok(()), |unknown| {
                Err(EngineError::unsupported_selection(unknown.clone()))
            })
    }

    /// Resolves `selection` to sources, keeping registration order.
    ///
    /// # Errors
    ///
    /// Fails as [`ScanRegistry::validate`] does.
    pub fn resolve(&self, selection: &Selection) -> Result<Vec<Arc<dyn ScanSource>>, EngineError> {
        self.validate(selection)?;
        Ok(self
            .sources
            .iter()
            .filter(|source| selection.includes(&source.info().id))
            .cloned()
            .collect())
    }

    /// Number of registered sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Reports whether no source is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Builds the registry the daemon ships with.
///
/// Locations the platform does not provide are left out rather than failing.
#[must_use]
pub fn default_registry(safety: &Arc<dyn SafetyCheck>) -> ScanRegistry {
    let mut registry = ScanRegistry::new();
    let candidates = [
        (
            CategoryInfo::new("user-cache", "User application cache", true),
            dirs::cache_dir(),
            RiskLevel::Safe,
        ),
        (
            CategoryInfo::new("trash", "Trash", false),
            trash_dir(),
            RiskLevel::Moderate,
        ),
        (
            CategoryInfo::new("temp-files", "Temporary file", false),
            Some(env::temp_dir()),
            RiskLevel::Risky,
        ),
    ];
    for (info, location, risk) in candidates {
        let Some(root) = location else {
            debug!(target: ENGINE_TARGET, category = %info.id, "no location on this platform");
            continue;
        };
        let source = DirectoryScanSource::new(info, root, risk, Arc::clone(safety));
        if let Err(error) = registry.register(Arc::new(source)) {
            warn!(target: ENGINE_TARGET, %error, "skipping category");
        }
    }
    registry
}

#[cfg(target_os = "macos")]
fn trash_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".Trash"))
}

#[cfg(not(target_os = "macos"))]
fn trash_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|data| data.join("Trash").join("files"))
}
