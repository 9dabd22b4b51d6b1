use std::process::Command;
use std::time::Duration;

use pypm_core::{CancelToken, Environment, MirrorConfig, Operation, OutdatedRecord, PackageRecord};
use tracing::{debug, warn};

use crate::listing::{
    mentions_missing_package, mentions_network_failure, parse_index_versions,
    parse_installed_listing, parse_outdated_listing,
};
use crate::process::{run_captured, RunLimits};
use crate::{IndexVersions, Installer, InstallerError, InstallerOutput};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Drives `<interpreter> -m pip` for each environment.
#[derive(Debug, Clone, Default)]
pub struct PipInstaller {
    pub(crate) limits: RunLimits,
}

impl PipInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.limits.timeout = timeout;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.limits.cancel = cancel;
        self
    }

    fn run(
        &self,
        command: Command,
        operation: Operation,
    ) -> Result<InstallerOutput, InstallerError> {
        run_captured(command, operation, &self.limits)
    }

    /// Runs a read-only query and hands back stdout, mapping a failed exit to
    /// either an unreachable index or a plain failure.
    fn run_query(&self, command: Command, operation: Operation) -> Result<String, InstallerError> {
        let output = self.run(command, operation)?;
        if output.success() {
            return Ok(output.stdout);
        }

        let diagnostic = output.diagnostic();
        if mentions_network_failure(&output.stderr) {
            return Err(InstallerError::IndexUnreachable {
                operation,
                diagnostic,
            });
        }
        Err(InstallerError::Failed {
            operation,
            diagnostic,
        })
    }
}

impl Installer for PipInstaller {
    fn list_installed(
        &self,
        environment: &Environment,
    ) -> Result<Vec<PackageRecord>, InstallerError> {
        let stdout =
            self.run_query(build_list_command(environment), Operation::ListInstalled)?;
        parse_installed_listing(&stdout)
    }

    fn list_outdated(
        &self,
        environment: &Environment,
        mirror: &MirrorConfig,
    ) -> Result<Vec<OutdatedRecord>, InstallerError> {
        let output = self.run(
            build_outdated_command(environment, mirror),
            Operation::ListOutdated,
        )?;
        // pip still exits 0 when it could not reach the index; it only warns.
        if mentions_network_failure(&output.stderr) {
            return Err(InstallerError::IndexUnreachable {
                operation: Operation::ListOutdated,
                diagnostic: output.diagnostic(),
            });
        }
        if !output.success() {
            return Err(InstallerError::Failed {
                operation: Operation::ListOutdated,
                diagnostic: output.diagnostic(),
            });
        }
        parse_outdated_listing(&output.stdout)
    }

    fn index_versions(
        &self,
        environment: &Environment,
        name: &str,
        mirror: &MirrorConfig,
    ) -> Result<Option<IndexVersions>, InstallerError> {
        let output = self.run(
            build_index_versions_command(environment, name, mirror),
            Operation::IndexQuery,
        )?;
        if output.success() {
            return parse_index_versions(&output.stdout).map(Some);
        }

        let diagnostic = output.diagnostic();
        if mentions_network_failure(&output.stderr) {
            warn!(
                package = name,
                mirror = %mirror.name,
                "mirror unreachable during version query"
            );
            return Err(InstallerError::IndexUnreachable {
                operation: Operation::IndexQuery,
                diagnostic,
            });
        }
        if mentions_missing_package(&output.stderr) || mentions_missing_package(&output.stdout) {
            debug!(package = name, mirror = %mirror.name, "mirror does not carry package");
            return Ok(None);
        }
        Err(InstallerError::Failed {
            operation: Operation::IndexQuery,
            diagnostic,
        })
    }

    fn install(
        &self,
        environment: &Environment,
        name: &str,
        mirror: &MirrorConfig,
    ) -> Result<InstallerOutput, InstallerError> {
        self.run(
            build_install_command(environment, name, mirror, false),
            Operation::Install,
        )
    }

    fn upgrade(
        &self,
        environment: &Environment,
        name: &str,
        mirror: &MirrorConfig,
    ) -> Result<InstallerOutput, InstallerError> {
        self.run(
            build_install_command(environment, name, mirror, true),
            Operation::Upgrade,
        )
    }

    fn uninstall(
        &self,
        environment: &Environment,
        name: &str,
    ) -> Result<InstallerOutput, InstallerError> {
        self.run(
            build_uninstall_command(environment, name),
            Operation::Uninstall,
        )
    }
}

pub(crate) fn base_pip_command(environment: &Environment) -> Command {
    let mut command = Command::new(environment.executable());
    command
        .arg("-m")
        .arg("pip")
        .env("PIP_DISABLE_PIP_VERSION_CHECK", "1")
        .env("PIP_NO_INPUT", "1")
        .env("PYTHONIOENCODING", "utf-8");
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }
    command
}

pub(crate) fn build_list_command(environment: &Environment) -> Command {
    let mut command = base_pip_command(environment);
    command.arg("list").arg("--format=json");
    command
}

pub(crate) fn build_outdated_command(environment: &Environment, mirror: &MirrorConfig) -> Command {
    let mut command = base_pip_command(environment);
    command.arg("list").arg("--outdated").arg("--format=json");
    push_index_args(&mut command, mirror);
    command
}

pub(crate) fn build_index_versions_command(
    environment: &Environment,
    name: &str,
    mirror: &MirrorConfig,
) -> Command {
    let mut command = base_pip_command(environment);
    command.arg("index").arg("versions").arg(name);
    push_index_args(&mut command, mirror);
    command
}

pub(crate) fn build_install_command(
    environment: &Environment,
    name: &str,
    mirror: &MirrorConfig,
    upgrade: bool,
) -> Command {
    let mut command = base_pip_command(environment);
    command.arg("install");
    if upgrade {
        command.arg("--upgrade");
    }
    command.arg(name);
    push_index_args(&mut command, mirror);
    command
}

pub(crate) fn build_uninstall_command(environment: &Environment, name: &str) -> Command {
    let mut command = base_pip_command(environment);
    command.arg("uninstall").arg(name).arg("-y");
    command
}

fn push_index_args(command: &mut Command, mirror: &MirrorConfig) {
    if mirror.is_default_index() {
        return;
    }
    command.arg("-i").arg(&mirror.index_url);
    if let Some(host) = mirror.trusted_host() {
        command.arg("--trusted-host").arg(host);
    }
}
