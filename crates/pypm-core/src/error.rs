use thiserror::Error;

use crate::Operation;

/// Every failure the core reports to a shell. Nothing crosses that boundary
/// as a panic or an untyped error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid package name '{name}': use only letters, digits, '-' or '_'")]
    InvalidPackageName { name: String },

    #[error("package index unreachable: {reason}")]
    IndexUnreachable { reason: String },

    #[error("package '{name}' was not found on the package index")]
    PackageNotFound { name: String },

    #[error("{operation} '{name}' failed: {diagnostic}")]
    OperationFailed {
        operation: Operation,
        name: String,
        diagnostic: String,
    },

    #[error("package '{name}' is not installed in {environment}")]
    NotInstalled { name: String, environment: String },

    #[error("failed to refresh packages for {environment}: {reason}")]
    RefreshFailed { environment: String, reason: String },

    #[error("packages for {environment} have not been scanned yet")]
    NotYetRefreshed { environment: String },

    #[error("no environment matches '{selector}'")]
    UnknownEnvironment { selector: String },

    #[error("unknown mirror '{name}'")]
    UnknownMirror { name: String },

    #[error("invalid mirror: {reason}")]
    InvalidMirror { reason: String },
}

/// Coarse grouping a shell needs to tell "not found", "network problem" and
/// "command failed" apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Usage,
    NotFound,
    Network,
    CommandFailed,
    Stale,
}

impl CoreError {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::InvalidPackageName { .. }
            | Self::UnknownEnvironment { .. }
            | Self::UnknownMirror { .. }
            | Self::InvalidMirror { .. } => FailureCategory::Usage,
            Self::PackageNotFound { .. } | Self::NotInstalled { .. } => FailureCategory::NotFound,
            Self::IndexUnreachable { .. } => FailureCategory::Network,
            Self::OperationFailed { .. } | Self::RefreshFailed { .. } => {
                FailureCategory::CommandFailed
            }
            Self::NotYetRefreshed { .. } => FailureCategory::Stale,
        }
    }
}
