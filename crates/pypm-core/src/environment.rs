use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Label used when an executable does not sit in a recognizable install layout,
/// and for the synthetic environment returned when discovery finds nothing.
pub const FALLBACK_LABEL: &str = "python";

/// One interpreter installation. Identity is the executable path; the label is
/// display-only.
#[derive(Debug, Clone, Serialize)]
pub struct Environment {
    label: String,
    executable: PathBuf,
}

impl Environment {
    pub fn new(label: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            executable: executable.into(),
        }
    }

    /// Whatever interpreter the host resolves for the conventional name at run time.
    pub fn fallback() -> Self {
        let executable = if cfg!(windows) { "python" } else { "python3" };
        Self::new(FALLBACK_LABEL, executable)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        self.executable == other.executable
    }
}

impl Eq for Environment {}

impl Hash for Environment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.executable.hash(state);
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.executable.display())
    }
}
