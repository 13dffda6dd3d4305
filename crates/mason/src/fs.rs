use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;

use rustc_hash::FxHashMap;

use crate::diagnostics::BuildError;

/// Interface between the core and the file system. Injected so staleness
/// checks can be exercised without touching a real disk.
pub trait FsGateway {
    fn exists(&self, path: &str) -> bool;

    /// Modification time of `path`; only ordering comparisons are meaningful.
    fn last_write_time(&self, path: &str) -> Result<SystemTime, BuildError>;

    /// Create `path`, or refresh its modification time if it already exists.
    fn touch(&self, path: &str) -> Result<(), BuildError>;
}

/// Production gateway backed by the real file system.
#[derive(Debug, Default)]
pub struct OsFs;

impl FsGateway for OsFs {
    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn last_write_time(&self, path: &str) -> Result<SystemTime, BuildError> {
        std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|err| {
                BuildError::io(format!("Checking last write time of '{path}': {err}"))
            })
    }

    fn touch(&self, path: &str) -> Result<(), BuildError> {
        File::create(path)
            .map(|_| ())
            .map_err(|err| BuildError::io(format!("Failed to create file '{path}': {err}")))
    }
}

/// In-memory gateway: a map from path to modification time. Useful for tests
/// and for embedders that want to dry-run a build.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Mutex<FxHashMap<String, SystemTime>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` as modified at an explicit time.
    pub fn touch_at(&self, path: &str, time: SystemTime) {
        self.files.lock().unwrap().insert(path.to_string(), time);
    }

    pub fn remove(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }
}

impl FsGateway for MemoryFs {
    fn exists(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn last_write_time(&self, path: &str) -> Result<SystemTime, BuildError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or_else(|| BuildError::io(format!("No such file '{path}'")))
    }

    fn touch(&self, path: &str) -> Result<(), BuildError> {
        self.touch_at(path, SystemTime::now());
        Ok(())
    }
}
