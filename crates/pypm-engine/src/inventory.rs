use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use pypm_core::{CoreError, Environment, Inventory, PackageRecord};
use pypm_installer::Installer;
use tracing::{debug, warn};

use crate::EnvironmentLocks;

/// Last known installed packages per environment.
///
/// Entries change only through [`InventoryCache::refresh`]; a refresh replaces
/// the whole entry and a failed refresh leaves the previous one in place.
pub struct InventoryCache {
    installer: Arc<dyn Installer>,
    locks: Arc<EnvironmentLocks>,
    entries: RwLock<HashMap<PathBuf, Inventory>>,
}

impl InventoryCache {
    pub fn new(installer: Arc<dyn Installer>, locks: Arc<EnvironmentLocks>) -> Self {
        Self {
            installer,
            locks,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn refresh(&self, environment: &Environment) -> Result<Inventory, CoreError> {
        self.locks.run(environment, || self.refresh_held(environment))
    }

    /// Refresh for callers already holding the environment lock.
    pub(crate) fn refresh_held(&self, environment: &Environment) -> Result<Inventory, CoreError> {
        debug!(environment = %environment, "refreshing installed packages");
        let packages = self.installer.list_installed(environment).map_err(|err| {
            warn!(environment = %environment, error = %err, "refresh failed; keeping cache");
            CoreError::RefreshFailed {
                environment: environment.to_string(),
                reason: err.to_string(),
            }
        })?;

        let inventory = Inventory::new(environment.clone(), packages);
        debug!(
            environment = %environment,
            packages = inventory.len(),
            "installed packages refreshed"
        );
        self.entries
            .write()
            .insert(environment.executable().to_path_buf(), inventory.clone());
        Ok(inventory)
    }

    pub fn get(&self, environment: &Environment) -> Result<Inventory, CoreError> {
        self.entries
            .read()
            .get(environment.executable())
            .cloned()
            .ok_or_else(|| CoreError::NotYetRefreshed {
                environment: environment.to_string(),
            })
    }

    /// The cached record for `name`, matched by normalized name. Environments
    /// that were never refreshed have no records.
    pub fn lookup(&self, environment: &Environment, name: &str) -> Option<PackageRecord> {
        self.entries
            .read()
            .get(environment.executable())
            .and_then(|inventory| inventory.find(name).cloned())
    }

    /// `false` for environments that were never refreshed.
    pub fn contains(&self, environment: &Environment, name: &str) -> bool {
        self.entries
            .read()
            .get(environment.executable())
            .is_some_and(|inventory| inventory.contains(name))
    }

    pub fn is_refreshed(&self, environment: &Environment) -> bool {
        self.entries.read().contains_key(environment.executable())
    }
}
