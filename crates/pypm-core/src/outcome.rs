use std::fmt;

use crate::CoreError;

/// Installer-side operations, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Upgrade,
    Uninstall,
    ListInstalled,
    ListOutdated,
    IndexQuery,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::Uninstall => "uninstall",
            Self::ListInstalled => "list",
            Self::ListOutdated => "check-updates",
            Self::IndexQuery => "index-query",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Installed,
    Updated,
    Uninstalled,
    NoAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Installed,
    DeclinedInstall,
    Updated,
    DeclinedUpdate,
    UpToDate,
    Uninstalled,
}

impl TerminalState {
    pub fn action(self) -> Action {
        match self {
            Self::Installed => Action::Installed,
            Self::Updated => Action::Updated,
            Self::Uninstalled => Action::Uninstalled,
            Self::DeclinedInstall | Self::DeclinedUpdate | Self::UpToDate => Action::NoAction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshStatus {
    NotNeeded,
    Refreshed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub state: TerminalState,
    pub name: String,
    pub installed_version: Option<String>,
    pub latest_version: Option<String>,
    pub refresh: RefreshStatus,
}

impl Outcome {
    pub fn message(&self) -> String {
        let name = &self.name;
        match self.state {
            TerminalState::Installed => match &self.installed_version {
                Some(version) => format!("installed {name} {version}"),
                None => format!("installed {name}"),
            },
            TerminalState::DeclinedInstall => format!("{name} is not installed; install skipped"),
            TerminalState::Updated => match (&self.installed_version, &self.latest_version) {
                (Some(from), Some(to)) => format!("updated {name} {from} -> {to}"),
                _ => format!("updated {name}"),
            },
            TerminalState::DeclinedUpdate => match &self.latest_version {
                Some(latest) => format!("{name} {latest} is available; update skipped"),
                None => format!("{name} has an update available; update skipped"),
            },
            TerminalState::UpToDate => match &self.installed_version {
                Some(version) => format!("{name} {version} is already up to date"),
                None => format!("{name} is already up to date"),
            },
            TerminalState::Uninstalled => format!("uninstalled {name}"),
        }
    }
}

/// Flat record a shell renders for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub action: Action,
    pub succeeded: bool,
    pub message: String,
}

impl OperationResult {
    pub fn from_result(result: &Result<Outcome, CoreError>) -> Self {
        match result {
            Ok(outcome) => {
                let mut message = outcome.message();
                if let RefreshStatus::Failed(reason) = &outcome.refresh {
                    message.push_str(&format!(" (package list not refreshed: {reason})"));
                }
                Self {
                    action: outcome.state.action(),
                    succeeded: true,
                    message,
                }
            }
            Err(err) => Self {
                action: Action::NoAction,
                succeeded: false,
                message: err.to_string(),
            },
        }
    }
}
