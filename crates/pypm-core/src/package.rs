use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutdatedRecord {
    pub name: String,
    pub version: String,
    pub latest_version: String,
}

/// Local syntax guard run before any index traffic. Accepts ASCII letters,
/// digits, `-` and `_` only.
pub fn validate_package_name(name: &str) -> Result<(), CoreError> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidPackageName {
            name: name.to_string(),
        })
    }
}

/// Index-style normalization: lowercase, and every run of `-`, `_` or `.`
/// collapses to a single `-`.
pub fn normalize_package_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator_run = false;
    for ch in name.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !in_separator_run {
                normalized.push('-');
            }
            in_separator_run = true;
        } else {
            normalized.extend(ch.to_lowercase());
            in_separator_run = false;
        }
    }
    normalized
}

pub fn same_package(left: &str, right: &str) -> bool {
    normalize_package_name(left) == normalize_package_name(right)
}
