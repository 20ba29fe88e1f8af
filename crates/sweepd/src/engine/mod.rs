//! Scan and cleanup orchestration.
//!
//! The [`Engine`] runs scan sources and the cleanup executor, streaming
//! progress through a caller-supplied sink. It owns the single live scan
//! token: a successful scan replaces it, and a cleanup redeems it exactly once
//! before any deletion starts. At most one operation runs at a time; callers
//! claim the engine with [`Engine::try_begin`].

mod cancel;
mod cleanup;
mod errors;
mod model;
mod registry;
mod safety;
mod source;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};
use uuid::Uuid;

pub use self::cancel::CancelToken;
#[cfg(test)]
pub(crate) use self::cleanup::MockCleanupExecutor;
pub use self::cleanup::{CleanupExecutor, FsCleanupExecutor, RemovalError};
pub use self::errors::EngineError;
pub use self::model::{
    CategoryInfo, CategoryResult, CleanupEvent, CleanupTally, RemovalFailure, RiskLevel,
    ScanEntry, ScanEvent, ScanReport, Selection,
};
pub use self::registry::{DuplicateCategory, ScanRegistry, default_registry};
pub use self::safety::{PathBlocklist, SafetyCheck};
pub use self::source::{DirectoryScanSource, ScanSource, ScanSourceError};

const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine");

/// Result set a cleanup is authorised against.
#[derive(Debug)]
struct ScanToken {
    id: String,
    categories: Vec<CategoryResult>,
}

/// How a scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every selected source ran and a fresh token was issued.
    Completed(ScanReport),
    /// Cancellation was observed between sources; no token was issued.
    Cancelled,
}

/// Claim on the engine's single operation slot, released on drop.
#[derive(Debug)]
pub struct OperationPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for OperationPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Orchestrates scans and cleanups over a registry of sources.
pub struct Engine {
    registry: ScanRegistry,
    executor: Arc<dyn CleanupExecutor>,
    live_token: Mutex<Option<ScanToken>>,
    busy: Arc<AtomicBool>,
}

impl Engine {
    /// Creates an engine with no live token.
    #[must_use]
    pub fn new(registry: ScanRegistry, executor: Arc<dyn CleanupExecutor>) -> Self {
        Self {
            registry,
            executor,
            live_token: Mutex::new(None),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Static description of every registered category.
    #[must_use]
    pub fn categories(&self) -> Vec<CategoryInfo> {
        self.registry.categories()
    }

    /// Claims the operation slot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OperationInProgress`] while another permit is
    /// alive.
    pub fn try_begin(&self) -> Result<OperationPermit, EngineError> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| EngineError::OperationInProgress)?;
        Ok(OperationPermit {
            busy: Arc::clone(&self.busy),
        })
    }

    /// Reports whether an operation currently holds the slot.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Runs every selected source in registry order.
    ///
    /// A source that fails is recorded in its category's result and the scan
    /// moves on. A completed scan replaces any live token.
    ///
    /// # Errors
    ///
    /// Fails only for an unsupported selection or poisoned token state.
    pub fn run_scan(
        &self,
        cancel: &CancelToken,
        selection: &Selection,
        progress: &mut dyn FnMut(ScanEvent),
    ) -> Result<ScanOutcome, EngineError> {
        let sources = self.registry.resolve(selection)?;
        let total = sources.len();
        let mut categories = Vec::with_capacity(total);

        for (position, source) in sources.iter().enumerate() {
            if cancel.is_cancelled() {
                debug!(target: ENGINE_TARGET, remaining = total - position, "scan cancelled");
                return Ok(ScanOutcome::Cancelled);
            }
            let info = source.info();
            progress(ScanEvent {
                category: info.id.clone(),
                fraction: fraction(position, total),
            });
            let result = source.scan(cancel).unwrap_or_else(|error| {
                warn!(
                    target: ENGINE_TARGET,
                    category = %info.id,
                    %error,
                    "scan source failed"
                );
                CategoryResult::failed(info, error.to_string())
            });
            if cancel.is_cancelled() {
                debug!(target: ENGINE_TARGET, category = %info.id, "scan cancelled");
                return Ok(ScanOutcome::Cancelled);
            }
            progress(ScanEvent {
                category: info.id.clone(),
                fraction: fraction(position + 1, total),
            });
            categories.push(result);
        }

        let token = Uuid::new_v4().to_string();
        let total_size = categories.iter().map(CategoryResult::total_size).sum();
        *self.token_slot()? = Some(ScanToken {
            id: token.clone(),
            categories: categories.clone(),
        });
        info!(
            target: ENGINE_TARGET,
            categories = categories.len(),
            total_size,
            "scan completed"
        );
        Ok(ScanOutcome::Completed(ScanReport {
            categories,
            total_size,
            token,
        }))
    }

    /// Deletes the entries of the scan `token` authorises.
    ///
    /// The token is redeemed before the first deletion. Once started, every
    /// selected entry is processed even if `cancel` fires; cancellation only
    /// suppresses further progress events.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidToken`] unless `token` matches the live
    /// token, and a selection error if `selection` names unknown categories.
    /// A bad selection leaves the token live.
    pub fn run_cleanup(
        &self,
        cancel: &CancelToken,
        token: &str,
        selection: &Selection,
        progress: &mut dyn FnMut(CleanupEvent),
    ) -> Result<CleanupTally, EngineError> {
        self.registry.validate(selection)?;
        let authorised = self.redeem(token)?;

        let entries: Vec<&ScanEntry> = authorised
            .categories
            .iter()
            .filter(|category| selection.includes(category.category()))
            .flat_map(CategoryResult::entries)
            .collect();
        let total = entries.len();
        let mut tally = CleanupTally::default();

        for (position, entry) in entries.into_iter().enumerate() {
            match self.executor.remove(entry) {
                Ok(bytes) => {
                    tally.removed_count += 1;
                    tally.bytes_freed += bytes;
                }
                Err(error) => {
                    warn!(
                        target: ENGINE_TARGET,
                        path = %entry.path().display(),
                        %error,
                        "failed to remove entry"
                    );
                    tally.failed_count += 1;
                    tally.failures.push(RemovalFailure {
                        path: entry.path().to_path_buf(),
                        error: error.to_string(),
                    });
                }
            }
            if !cancel.is_cancelled() {
                progress(CleanupEvent {
                    path: entry.path().to_path_buf(),
                    index: position + 1,
                    total,
                });
            }
        }

        info!(
            target: ENGINE_TARGET,
            removed = tally.removed_count,
            failed = tally.failed_count,
            bytes_freed = tally.bytes_freed,
            "cleanup completed"
        );
        Ok(tally)
    }

    /// Takes the live token if `presented` matches it.
    fn redeem(&self, presented: &str) -> Result<ScanToken, EngineError> {
        self.token_slot()?
            .take_if(|live| live.id == presented)
            .ok_or(EngineError::InvalidToken)
    }

    fn token_slot(&self) -> Result<MutexGuard<'_, Option<ScanToken>>, EngineError> {
        self.live_token
            .lock()
            .map_err(|_| EngineError::StatePoisoned)
    }
}

#[expect(
    clippy::cast_precision_loss,
    clippy::float_arithmetic,
    reason = "progress is a ratio of source counts far below f64's exact integer range"
)]
fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    done as f64 / total as f64
}
