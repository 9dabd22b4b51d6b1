use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use pypm_core::{validate_package_name, CoreError, Environment, Inventory, MirrorConfig, Outcome};
use pypm_index::{MirrorCatalog, PackageIndex};
use pypm_installer::{discover_environments, ExecutableResolver, IndexVersions, Installer};
use tracing::debug;

use crate::{Consent, EnvironmentLocks, InventoryCache, Orchestrator};

/// Everything one shell works with: discovered environments, the selected
/// environment and mirror, and the inventory cache behind the orchestrator.
///
/// Sessions share nothing; two of them never see each other's cache.
pub struct Session {
    environments: Vec<Environment>,
    selected: usize,
    catalog: MirrorCatalog,
    mirror: MirrorConfig,
    index: Arc<dyn PackageIndex>,
    inventory: Arc<InventoryCache>,
    orchestrator: Orchestrator,
}

impl Session {
    /// An empty `environments` list is replaced by the fallback interpreter.
    pub fn new(
        environments: Vec<Environment>,
        catalog: MirrorCatalog,
        installer: Arc<dyn Installer>,
        index: Arc<dyn PackageIndex>,
    ) -> Self {
        let locks = Arc::new(EnvironmentLocks::new());
        let inventory = Arc::new(InventoryCache::new(
            Arc::clone(&installer),
            Arc::clone(&locks),
        ));
        let orchestrator = Orchestrator::new(
            Arc::clone(&index),
            installer,
            Arc::clone(&inventory),
            locks,
        );

        Self {
            environments: non_empty(environments),
            selected: 0,
            mirror: catalog.default_mirror().clone(),
            catalog,
            index,
            inventory,
            orchestrator,
        }
    }

    pub fn discover(
        resolver: &dyn ExecutableResolver,
        catalog: MirrorCatalog,
        installer: Arc<dyn Installer>,
        index: Arc<dyn PackageIndex>,
    ) -> Self {
        Self::new(discover_environments(resolver), catalog, installer, index)
    }

    /// Replaces the environment set. The selection survives when its
    /// executable is still present, otherwise it falls back to the first.
    pub fn rediscover(&mut self, resolver: &dyn ExecutableResolver) {
        let current = self.environment().clone();
        self.environments = non_empty(discover_environments(resolver));
        self.selected = self
            .environments
            .iter()
            .position(|environment| *environment == current)
            .unwrap_or(0);
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    pub fn environment(&self) -> &Environment {
        &self.environments[self.selected]
    }

    /// Selects by `#N` (1-based position), by label ignoring case, or by
    /// executable path.
    pub fn select_environment(&mut self, selector: &str) -> Result<&Environment, CoreError> {
        let selector = selector.trim();
        let position = match selector.strip_prefix('#') {
            Some(number) => number
                .parse::<usize>()
                .ok()
                .filter(|number| (1..=self.environments.len()).contains(number))
                .map(|number| number - 1),
            None => self
                .environments
                .iter()
                .position(|environment| environment.label().eq_ignore_ascii_case(selector))
                .or_else(|| self.position_of_path(Path::new(selector))),
        };

        let Some(position) = position else {
            return Err(CoreError::UnknownEnvironment {
                selector: selector.to_string(),
            });
        };
        self.selected = position;
        debug!(environment = %self.environment(), "environment selected");
        Ok(self.environment())
    }

    pub fn mirrors(&self) -> &MirrorCatalog {
        &self.catalog
    }

    pub fn mirror(&self) -> &MirrorConfig {
        &self.mirror
    }

    pub fn select_mirror(&mut self, name: &str) -> Result<&MirrorConfig, CoreError> {
        self.mirror = self.catalog.find(name)?.clone();
        debug!(mirror = %self.mirror.name, "mirror selected");
        Ok(&self.mirror)
    }

    pub fn refresh(&self) -> Result<Inventory, CoreError> {
        self.inventory.refresh(self.environment())
    }

    pub fn inventory(&self) -> Result<Inventory, CoreError> {
        self.inventory.get(self.environment())
    }

    pub fn inventory_cache(&self) -> &InventoryCache {
        &self.inventory
    }

    pub fn request(&self, name: &str, consent: &mut dyn Consent) -> Result<Outcome, CoreError> {
        self.orchestrator.request(self.environment(), name, &self.mirror, consent)
    }

    pub fn uninstall(&self, name: &str) -> Result<Outcome, CoreError> {
        self.orchestrator.uninstall(self.environment(), name)
    }

    pub fn outdated(&self) -> Result<BTreeMap<String, String>, CoreError> {
        self.index.outdated(self.environment(), &self.mirror)
    }

    pub fn available_versions(&self, name: &str) -> Result<IndexVersions, CoreError> {
        validate_package_name(name)?;
        self.index.available_versions(self.environment(), &self.mirror, name)
    }

    fn position_of_path(&self, path: &Path) -> Option<usize> {
        let wanted = path.canonicalize().ok();
        self.environments.iter().position(|environment| {
            environment.executable() == path
                || wanted.is_some()
                    && environment.executable().canonicalize().ok() == wanted
        })
    }
}

fn non_empty(environments: Vec<Environment>) -> Vec<Environment> {
    if environments.is_empty() {
        return vec![Environment::fallback()];
    }
    environments
}
