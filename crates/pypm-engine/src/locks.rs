use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use pypm_core::Environment;

/// Serializes work per environment identity. Work against different
/// environments never contends.
#[derive(Debug, Default)]
pub struct EnvironmentLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl EnvironmentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work` while holding the lock of `environment`. Not reentrant.
    pub fn run<T>(&self, environment: &Environment, work: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(environment.executable());
        let _guard = lock.lock();
        work()
    }

    fn lock_for(&self, executable: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(executable.to_path_buf()).or_default())
    }
}
