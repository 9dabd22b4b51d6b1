use pypm_core::{Operation, OutdatedRecord, PackageRecord};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::InstallerError;

/// Versions a mirror offers for one package, newest first as the installer
/// reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexVersions {
    pub name: String,
    pub latest: String,
    pub versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ListedPackage {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct ListedOutdatedPackage {
    name: String,
    version: String,
    latest_version: String,
}

const NETWORK_FAILURE_MARKERS: &[&str] = &[
    "NewConnectionError",
    "Failed to establish a new connection",
    "Temporary failure in name resolution",
    "Name or service not known",
    "ConnectTimeoutError",
    "Could not fetch URL",
    "ProxyError",
];

const MISSING_PACKAGE_MARKERS: &[&str] = &[
    "No matching distribution found",
    "Could not find a version that satisfies",
];

pub(crate) fn parse_installed_listing(raw: &str) -> Result<Vec<PackageRecord>, InstallerError> {
    let listed: Vec<ListedPackage> =
        parse_json_listing(raw).map_err(|reason| InstallerError::Schema {
            operation: Operation::ListInstalled,
            reason,
        })?;

    listed
        .into_iter()
        .map(|package| {
            require_non_empty(&package.name, "name", Operation::ListInstalled)?;
            require_non_empty(&package.version, "version", Operation::ListInstalled)?;
            Ok(PackageRecord {
                name: package.name,
                version: package.version,
            })
        })
        .collect()
}

pub(crate) fn parse_outdated_listing(raw: &str) -> Result<Vec<OutdatedRecord>, InstallerError> {
    let listed: Vec<ListedOutdatedPackage> =
        parse_json_listing(raw).map_err(|reason| InstallerError::Schema {
            operation: Operation::ListOutdated,
            reason,
        })?;

    listed
        .into_iter()
        .map(|package| {
            require_non_empty(&package.name, "name", Operation::ListOutdated)?;
            require_non_empty(&package.latest_version, "latest_version", Operation::ListOutdated)?;
            Ok(OutdatedRecord {
                name: package.name,
                version: package.version,
                latest_version: package.latest_version,
            })
        })
        .collect()
}

/// Parses `pip index versions` output:
///
/// ```text
/// requests (2.32.3)
/// Available versions: 2.32.3, 2.32.2, 2.31.0
/// ```
pub(crate) fn parse_index_versions(raw: &str) -> Result<IndexVersions, InstallerError> {
    let schema_error = |reason: &str| InstallerError::Schema {
        operation: Operation::IndexQuery,
        reason: reason.to_string(),
    };

    let mut lines = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("WARNING"));
    let header = lines
        .next()
        .ok_or_else(|| schema_error("empty version listing"))?;
    let (name, rest) = header
        .split_once(" (")
        .ok_or_else(|| schema_error("missing '<name> (<latest>)' header"))?;
    let latest = rest
        .strip_suffix(')')
        .ok_or_else(|| schema_error("unterminated latest version in header"))?;
    if name.trim().is_empty() || latest.trim().is_empty() {
        return Err(schema_error("empty name or latest version in header"));
    }

    let versions = lines
        .find_map(|line| line.strip_prefix("Available versions:"))
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|version| !version.is_empty())
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|| vec![latest.to_string()]);

    Ok(IndexVersions {
        name: name.trim().to_string(),
        latest: latest.trim().to_string(),
        versions,
    })
}

pub(crate) fn mentions_network_failure(text: &str) -> bool {
    NETWORK_FAILURE_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
}

pub(crate) fn mentions_missing_package(text: &str) -> bool {
    MISSING_PACKAGE_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
}

fn parse_json_listing<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("installer printed no package listing".to_string());
    }
    serde_json::from_str(trimmed).map_err(|err| err.to_string())
}

fn require_non_empty(
    value: &str,
    field: &str,
    operation: Operation,
) -> Result<(), InstallerError> {
    if value.trim().is_empty() {
        return Err(InstallerError::Schema {
            operation,
            reason: format!("package entry has an empty '{field}'"),
        });
    }
    Ok(())
}
