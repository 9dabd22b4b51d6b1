mod discovery;
mod error;
mod listing;
mod pip;
mod process;

pub use discovery::{discover_environments, interpreter_names, ExecutableResolver, WhichResolver};
pub use error::InstallerError;
pub use listing::IndexVersions;
pub use pip::PipInstaller;

use pypm_core::{Environment, MirrorConfig, OutdatedRecord, PackageRecord};

/// Captured result of one installer invocation that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl InstallerOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Text worth showing a user when the invocation failed: stderr if there is
    /// any, otherwise stdout, otherwise the exit status.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.status {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// The external package installer, scoped per call to one environment.
///
/// Mutating calls return `Ok` whenever the installer ran to completion, even
/// with a non-zero exit; `Err` means it never ran or was interrupted.
pub trait Installer: Send + Sync {
    fn list_installed(&self, environment: &Environment)
        -> Result<Vec<PackageRecord>, InstallerError>;

    fn list_outdated(
        &self,
        environment: &Environment,
        mirror: &MirrorConfig,
    ) -> Result<Vec<OutdatedRecord>, InstallerError>;

    /// `Ok(None)` when the mirror does not carry the package.
    fn index_versions(
        &self,
        environment: &Environment,
        name: &str,
        mirror: &MirrorConfig,
    ) -> Result<Option<IndexVersions>, InstallerError>;

    fn install(
        &self,
        environment: &Environment,
        name: &str,
        mirror: &MirrorConfig,
    ) -> Result<InstallerOutput, InstallerError>;

    fn upgrade(
        &self,
        environment: &Environment,
        name: &str,
        mirror: &MirrorConfig,
    ) -> Result<InstallerOutput, InstallerError>;

    fn uninstall(
        &self,
        environment: &Environment,
        name: &str,
    ) -> Result<InstallerOutput, InstallerError>;
}
