use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pypm_core::{sort_by_label_descending, Environment, FALLBACK_LABEL};
use tracing::{debug, warn};

/// Host facility answering "every executable on the search path named X".
pub trait ExecutableResolver {
    fn resolve_all(&self, program: &str) -> Result<Vec<PathBuf>>;
}

/// Search-path lookup backed by `which`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhichResolver;

impl ExecutableResolver for WhichResolver {
    fn resolve_all(&self, program: &str) -> Result<Vec<PathBuf>> {
        let paths = which::which_all(program)
            .with_context(|| format!("failed to search PATH for {program}"))?;
        Ok(paths.collect())
    }
}

pub fn interpreter_names() -> &'static [&'static str] {
    if cfg!(windows) {
        &["python"]
    } else {
        &["python3", "python"]
    }
}

/// Lists interpreter installations, most recent label first. Never returns an
/// empty list: with nothing found, the synthetic fallback environment stands in.
pub fn discover_environments(resolver: &dyn ExecutableResolver) -> Vec<Environment> {
    let mut seen = HashSet::new();
    let mut environments = Vec::new();

    for program in interpreter_names() {
        let paths = match resolver.resolve_all(program) {
            Ok(paths) => paths,
            Err(err) => {
                debug!(program, error = %err, "no executables resolved");
                continue;
            }
        };

        for path in paths {
            let identity = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if !seen.insert(identity) {
                continue;
            }
            let label = derive_label(&path);
            debug!(label = %label, path = %path.display(), "discovered interpreter");
            environments.push(Environment::new(label, path));
        }
    }

    if environments.is_empty() {
        warn!("no interpreter found on PATH; falling back to the default interpreter name");
        return vec![Environment::fallback()];
    }

    sort_by_label_descending(&mut environments, Environment::label);
    environments
}

/// Name of the directory holding the executable when it looks like an
/// interpreter install (`Python312`, `python3.11`), else the generic label.
pub(crate) fn derive_label(executable: &Path) -> String {
    executable
        .parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .filter(|name| name.to_ascii_lowercase().starts_with("python"))
        .map(ToString::to_string)
        .unwrap_or_else(|| FALLBACK_LABEL.to_string())
}
