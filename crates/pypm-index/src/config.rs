use std::path::PathBuf;

use anyhow::{Context, Result};

pub const CONFIG_ROOT_ENV: &str = "PYPM_HOME";

pub fn default_config_root() -> Result<PathBuf> {
    if let Some(root) = std::env::var_os(CONFIG_ROOT_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(root));
    }

    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows config root")?;
        return Ok(PathBuf::from(app_data).join("Pypm"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve config root")?;
    Ok(PathBuf::from(home).join(".pypm"))
}
