use std::sync::Arc;

use pypm_core::{
    same_package, validate_package_name, CoreError, Environment, MirrorConfig, Operation,
    Outcome, PackageRecord, RefreshStatus, TerminalState,
};
use pypm_index::PackageIndex;
use pypm_installer::{Installer, InstallerError, InstallerOutput};
use tracing::{debug, info, warn};

use crate::{EnvironmentLocks, InventoryCache};

/// A mutation the orchestrator is about to perform and needs consent for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offer {
    Install {
        name: String,
    },
    Update {
        name: String,
        installed: String,
        latest: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Decline,
}

/// Answers offers on behalf of the user.
pub trait Consent {
    fn decide(&mut self, offer: &Offer) -> Decision;
}

/// Fixed answer for every offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Apply,
    CheckOnly,
}

impl Consent for Intent {
    fn decide(&mut self, _offer: &Offer) -> Decision {
        match self {
            Self::Apply => Decision::Proceed,
            Self::CheckOnly => Decision::Decline,
        }
    }
}

impl<F> Consent for F
where
    F: FnMut(&Offer) -> Decision,
{
    fn decide(&mut self, offer: &Offer) -> Decision {
        self(offer)
    }
}

/// Resolves a package request against the index and the cached inventory,
/// then installs, updates or removes it.
///
/// Mutations of one environment are serialized with its inventory refresh;
/// each completed installer run is followed by exactly one refresh.
pub struct Orchestrator {
    index: Arc<dyn PackageIndex>,
    installer: Arc<dyn Installer>,
    inventory: Arc<InventoryCache>,
    locks: Arc<EnvironmentLocks>,
}

impl Orchestrator {
    pub fn new(
        index: Arc<dyn PackageIndex>,
        installer: Arc<dyn Installer>,
        inventory: Arc<InventoryCache>,
        locks: Arc<EnvironmentLocks>,
    ) -> Self {
        Self {
            index,
            installer,
            inventory,
            locks,
        }
    }

    /// Installs `name` if absent, updates it if the mirror has a newer
    /// release, and otherwise reports it as current.
    ///
    /// Presence is judged from the last refresh; this never refreshes first,
    /// so a package in a never-refreshed environment is offered for install.
    pub fn request(
        &self,
        environment: &Environment,
        name: &str,
        mirror: &MirrorConfig,
        consent: &mut dyn Consent,
    ) -> Result<Outcome, CoreError> {
        validate_package_name(name)?;

        if !self.index.exists(name)? {
            debug!(package = name, "index reports no such package");
            return Err(CoreError::PackageNotFound {
                name: name.to_string(),
            });
        }

        match self.inventory.lookup(environment, name) {
            Some(installed) => self.update_check(environment, name, installed, mirror, consent),
            None => self.install_offer(environment, name, mirror, consent),
        }
    }

    /// Removes `name`. Packages missing from the last refresh, including any
    /// package of a never-refreshed environment, are rejected without running
    /// the installer.
    pub fn uninstall(&self, environment: &Environment, name: &str) -> Result<Outcome, CoreError> {
        validate_package_name(name)?;

        let Some(installed) = self.inventory.lookup(environment, name) else {
            return Err(CoreError::NotInstalled {
                name: name.to_string(),
                environment: environment.to_string(),
            });
        };

        let refresh = self.mutate(environment, Operation::Uninstall, name, || {
            self.installer.uninstall(environment, &installed.name)
        })?;
        Ok(Outcome {
            state: TerminalState::Uninstalled,
            name: name.to_string(),
            installed_version: Some(installed.version),
            latest_version: None,
            refresh,
        })
    }

    fn update_check(
        &self,
        environment: &Environment,
        name: &str,
        installed: PackageRecord,
        mirror: &MirrorConfig,
        consent: &mut dyn Consent,
    ) -> Result<Outcome, CoreError> {
        let outdated = self.index.outdated(environment, mirror)?;
        let latest = outdated
            .iter()
            .find(|(candidate, _)| same_package(candidate, &installed.name))
            .map(|(_, latest)| latest.clone());

        let Some(latest) = latest else {
            return Ok(Outcome {
                state: TerminalState::UpToDate,
                name: name.to_string(),
                installed_version: Some(installed.version),
                latest_version: None,
                refresh: RefreshStatus::NotNeeded,
            });
        };

        let offer = Offer::Update {
            name: name.to_string(),
            installed: installed.version.clone(),
            latest: latest.clone(),
        };
        if consent.decide(&offer) == Decision::Decline {
            return Ok(Outcome {
                state: TerminalState::DeclinedUpdate,
                name: name.to_string(),
                installed_version: Some(installed.version),
                latest_version: Some(latest),
                refresh: RefreshStatus::NotNeeded,
            });
        }

        let refresh = self.mutate(environment, Operation::Upgrade, name, || {
            self.installer.upgrade(environment, &installed.name, mirror)
        })?;
        Ok(Outcome {
            state: TerminalState::Updated,
            name: name.to_string(),
            installed_version: Some(installed.version),
            latest_version: Some(latest),
            refresh,
        })
    }

    fn install_offer(
        &self,
        environment: &Environment,
        name: &str,
        mirror: &MirrorConfig,
        consent: &mut dyn Consent,
    ) -> Result<Outcome, CoreError> {
        let offer = Offer::Install {
            name: name.to_string(),
        };
        if consent.decide(&offer) == Decision::Decline {
            return Ok(Outcome {
                state: TerminalState::DeclinedInstall,
                name: name.to_string(),
                installed_version: None,
                latest_version: None,
                refresh: RefreshStatus::NotNeeded,
            });
        }

        let refresh = self.mutate(environment, Operation::Install, name, || {
            self.installer.install(environment, name, mirror)
        })?;
        let installed_version = match refresh {
            RefreshStatus::Refreshed => self
                .inventory
                .lookup(environment, name)
                .map(|record| record.version),
            _ => None,
        };
        Ok(Outcome {
            state: TerminalState::Installed,
            name: name.to_string(),
            installed_version,
            latest_version: None,
            refresh,
        })
    }

    /// Runs one mutating installer call under the environment lock and
    /// refreshes the inventory afterwards, whatever the exit status.
    ///
    /// Runs that never started or were interrupted leave the cache alone.
    fn mutate(
        &self,
        environment: &Environment,
        operation: Operation,
        name: &str,
        run: impl FnOnce() -> Result<InstallerOutput, InstallerError>,
    ) -> Result<RefreshStatus, CoreError> {
        self.locks.run(environment, || {
            debug!(
                environment = %environment,
                package = name,
                %operation,
                "running installer"
            );
            let output = run().map_err(|err| {
                let reason = if err.is_interrupted() {
                    "installer interrupted; cache left untouched"
                } else {
                    "installer did not start; cache left untouched"
                };
                warn!(
                    environment = %environment,
                    package = name,
                    error = %err,
                    "{reason}"
                );
                err.to_core_error(name)
            })?;

            let refresh = match self.inventory.refresh_held(environment) {
                Ok(_) => RefreshStatus::Refreshed,
                Err(CoreError::RefreshFailed { reason, .. }) => RefreshStatus::Failed(reason),
                Err(err) => RefreshStatus::Failed(err.to_string()),
            };

            if !output.success() {
                warn!(
                    environment = %environment,
                    package = name,
                    %operation,
                    status = ?output.status,
                    "installer reported failure"
                );
                return Err(CoreError::OperationFailed {
                    operation,
                    name: name.to_string(),
                    diagnostic: output.diagnostic(),
                });
            }

            info!(
                environment = %environment,
                package = name,
                %operation,
                "package operation completed"
            );
            Ok(refresh)
        })
    }
}
