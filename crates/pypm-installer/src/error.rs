use std::time::Duration;

use pypm_core::{CoreError, Operation};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallerError {
    #[error("{operation} failed to launch {program}: {reason}")]
    Launch {
        operation: Operation,
        program: String,
        reason: String,
    },

    #[error("{operation} was cancelled")]
    Cancelled { operation: Operation },

    #[error("{operation} timed out after {}s", .timeout.as_secs())]
    TimedOut {
        operation: Operation,
        timeout: Duration,
    },

    #[error("{operation} could not reach the package index: {diagnostic}")]
    IndexUnreachable {
        operation: Operation,
        diagnostic: String,
    },

    #[error("{operation} failed: {diagnostic}")]
    Failed {
        operation: Operation,
        diagnostic: String,
    },

    #[error("unexpected {operation} output: {reason}")]
    Schema { operation: Operation, reason: String },
}

impl InstallerError {
    /// Cancelled or timed out; the installer may have been killed mid-way.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::TimedOut { .. })
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Launch { operation, .. }
            | Self::Cancelled { operation }
            | Self::TimedOut { operation, .. }
            | Self::IndexUnreachable { operation, .. }
            | Self::Failed { operation, .. }
            | Self::Schema { operation, .. } => *operation,
        }
    }

    /// Maps onto the boundary taxonomy. Interrupted index queries count as an
    /// unreachable index; interrupted mutations as failed operations.
    pub fn to_core_error(&self, name: &str) -> CoreError {
        let operation = self.operation();
        let is_query = matches!(operation, Operation::ListOutdated | Operation::IndexQuery);
        match self {
            Self::IndexUnreachable { diagnostic, .. } => CoreError::IndexUnreachable {
                reason: diagnostic.clone(),
            },
            Self::Cancelled { .. } | Self::TimedOut { .. } if is_query => {
                CoreError::IndexUnreachable {
                    reason: self.to_string(),
                }
            }
            Self::Failed { diagnostic, .. } => CoreError::OperationFailed {
                operation,
                name: name.to_string(),
                diagnostic: diagnostic.clone(),
            },
            _ => CoreError::OperationFailed {
                operation,
                name: name.to_string(),
                diagnostic: self.to_string(),
            },
        }
    }
}
