use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pypm_core::{CoreError, Environment, MirrorConfig};
use pypm_installer::{IndexVersions, Installer};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, warn};

pub const DEFAULT_PROJECT_BASE: &str = "https://pypi.org";

/// Remote catalog queries the orchestrator depends on.
pub trait PackageIndex: Send + Sync {
    /// `Ok(false)` only when the index says the project page is missing.
    fn exists(&self, name: &str) -> Result<bool, CoreError>;

    /// Installed packages of `environment` with a newer release on `mirror`,
    /// keyed by the name the installer reports, valued by the latest version.
    fn outdated(
        &self,
        environment: &Environment,
        mirror: &MirrorConfig,
    ) -> Result<BTreeMap<String, String>, CoreError>;

    fn available_versions(
        &self,
        environment: &Environment,
        mirror: &MirrorConfig,
        name: &str,
    ) -> Result<IndexVersions, CoreError>;
}

#[derive(Debug, Clone)]
pub struct IndexClientOptions {
    pub project_base: String,
    pub timeout: Option<Duration>,
}

impl Default for IndexClientOptions {
    fn default() -> Self {
        Self {
            project_base: DEFAULT_PROJECT_BASE.to_string(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Probes project pages over HTTP and asks the installer for version data.
pub struct PypiIndexClient {
    http: Client,
    project_base: String,
    installer: Arc<dyn Installer>,
}

impl PypiIndexClient {
    pub fn new(installer: Arc<dyn Installer>, options: IndexClientOptions) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(format!("pypm/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10));
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("failed to build package index http client")?;

        Ok(Self {
            http,
            project_base: options.project_base.trim_end_matches('/').to_string(),
            installer,
        })
    }

    pub fn project_url(&self, name: &str) -> String {
        format!("{}/project/{}/", self.project_base, name)
    }
}

impl PackageIndex for PypiIndexClient {
    fn exists(&self, name: &str) -> Result<bool, CoreError> {
        let url = self.project_url(name);
        debug!(url = %url, "probing package index");

        let response = self.http.get(&url).send().map_err(|err| {
            warn!(url = %url, error = %err, "package index unreachable");
            CoreError::IndexUnreachable {
                reason: describe_transport_error(&err),
            }
        })?;

        let status = response.status();
        let exists = project_exists_for_status(status);
        if exists && !status.is_success() {
            warn!(
                url = %url,
                %status,
                "ambiguous index response; treating package as existing"
            );
        }
        Ok(exists)
    }

    fn outdated(
        &self,
        environment: &Environment,
        mirror: &MirrorConfig,
    ) -> Result<BTreeMap<String, String>, CoreError> {
        let records = self
            .installer
            .list_outdated(environment, mirror)
            .map_err(|err| err.to_core_error(&environment.to_string()))?;

        Ok(records
            .into_iter()
            .map(|record| (record.name, record.latest_version))
            .collect())
    }

    fn available_versions(
        &self,
        environment: &Environment,
        mirror: &MirrorConfig,
        name: &str,
    ) -> Result<IndexVersions, CoreError> {
        self.installer
            .index_versions(environment, name, mirror)
            .map_err(|err| err.to_core_error(name))?
            .ok_or_else(|| CoreError::PackageNotFound {
                name: name.to_string(),
            })
    }
}

/// Missing-resource statuses mean "no such project"; every other status,
/// errors included, fails open.
pub(crate) fn project_exists_for_status(status: StatusCode) -> bool {
    !matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE)
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return format!("request timed out: {err}");
    }
    if err.is_connect() {
        return format!("connection failed: {err}");
    }
    err.to_string()
}
