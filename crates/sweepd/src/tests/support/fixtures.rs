//! Scan sources backed by temporary directories or controlled by the test.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use crate::engine::{
    CancelToken, CategoryInfo, CategoryResult, DirectoryScanSource, PathBlocklist, RiskLevel,
    ScanRegistry, ScanSource, ScanSourceError,
};

const GATE_TIMEOUT: Duration = Duration::from_secs(5);
const GATE_POLL: Duration = Duration::from_millis(10);

/// Two scannable categories in a temporary directory.
///
/// `cache` holds a `big` directory and a loose file; `logs` holds one file.
pub struct FixtureTree {
    dir: TempDir,
}

impl FixtureTree {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let cache = dir.path().join("cache");
        let logs = dir.path().join("logs");
        fs::create_dir_all(cache.join("big/nested")).expect("cache tree");
        fs::create_dir_all(&logs).expect("logs dir");
        fs::write(cache.join("big/blob.bin"), vec![0_u8; 4096]).expect("blob");
        fs::write(cache.join("big/nested/part.bin"), vec![0_u8; 1024]).expect("part");
        fs::write(cache.join("old.tmp"), b"0123456789").expect("loose file");
        fs::write(logs.join("app.log"), b"log line\n").expect("log file");
        Self { dir }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.dir.path().join("logs")
    }

    /// Registry with `cache` then `logs`, guarded by an empty blocklist.
    pub fn registry(&self) -> ScanRegistry {
        let safety = Arc::new(PathBlocklist::empty());
        let mut registry = ScanRegistry::new();
        registry
            .register(Arc::new(DirectoryScanSource::new(
                CategoryInfo::new("cache", "Fixture cache", true),
                self.cache_dir(),
                RiskLevel::Safe,
                safety.clone(),
            )))
            .expect("register cache");
        registry
            .register(Arc::new(DirectoryScanSource::new(
                CategoryInfo::new("logs", "Fixture logs", false),
                self.logs_dir(),
                RiskLevel::Moderate,
                safety,
            )))
            .expect("register logs");
        registry
    }

    /// Removes `path` behind the daemon's back.
    pub fn remove(&self, path: &Path) {
        if path.is_dir() {
            fs::remove_dir_all(path).expect("remove fixture dir");
        } else {
            fs::remove_file(path).expect("remove fixture file");
        }
    }
}

#[derive(Default)]
struct GateState {
    entered: bool,
    open: bool,
}

#[derive(Default)]
struct Gate {
    state: Mutex<GateState>,
    changed: Condvar,
}

/// Source whose scan blocks until the test opens it or the scan is cancelled.
#[derive(Clone)]
pub struct GatedSource {
    info: CategoryInfo,
    gate: Arc<Gate>,
}

impl GatedSource {
    pub fn new(id: &str) -> Self {
        Self {
            info: CategoryInfo::new(id, "Gated fixture", true),
            gate: Arc::new(Gate::default()),
        }
    }

    /// Registry holding only this source.
    pub fn registry(&self) -> ScanRegistry {
        let mut registry = ScanRegistry::new();
        registry
            .register(Arc::new(self.clone()))
            .expect("register gated source");
        registry
    }

    /// Blocks until a scan is waiting on the gate.
    pub fn wait_until_entered(&self) {
        let state = self.gate.state.lock().expect("gate mutex poisoned");
        let (state, _) = self
            .gate
            .changed
            .wait_timeout_while(state, GATE_TIMEOUT, |state| !state.entered)
            .expect("gate mutex poisoned");
        assert!(state.entered, "scan never reached the gate");
    }

    /// Lets waiting and future scans finish.
    pub fn open(&self) {
        self.gate.state.lock().expect("gate mutex poisoned").open = true;
        self.gate.changed.notify_all();
    }
}

impl ScanSource for GatedSource {
    fn info(&self) -> &CategoryInfo {
        &self.info
    }

    fn scan(&self, cancel: &CancelToken) -> Result<CategoryResult, ScanSourceError> {
        let mut state = self.gate.state.lock().expect("gate mutex poisoned");
        state.entered = true;
        self.gate.changed.notify_all();
        while !state.open && !cancel.is_cancelled() {
            state = self
                .gate
                .changed
                .wait_timeout(state, GATE_POLL)
                .expect("gate mutex poisoned")
                .0;
        }
        Ok(CategoryResult::new(&self.info, Vec::new(), Vec::new()))
    }
}
