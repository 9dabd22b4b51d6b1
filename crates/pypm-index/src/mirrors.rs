use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use pypm_core::{
    builtin_mirrors, validate_index_url, validate_mirror_name, CoreError, MirrorConfig,
    DEFAULT_MIRROR_NAME,
};
use serde::{Deserialize, Serialize};

/// Built-in mirrors followed by user mirrors, plus the mirror selected when
/// the shell names none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorCatalog {
    mirrors: Vec<MirrorConfig>,
    default: String,
}

impl MirrorCatalog {
    pub fn builtin() -> Self {
        Self {
            mirrors: builtin_mirrors(),
            default: DEFAULT_MIRROR_NAME.to_string(),
        }
    }

    pub fn mirrors(&self) -> &[MirrorConfig] {
        &self.mirrors
    }

    pub fn find(&self, name: &str) -> Result<&MirrorConfig, CoreError> {
        self.mirrors
            .iter()
            .find(|mirror| mirror.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| CoreError::UnknownMirror {
                name: name.to_string(),
            })
    }

    pub fn default_mirror(&self) -> &MirrorConfig {
        self.find(&self.default)
            .unwrap_or_else(|_| &self.mirrors[0])
    }

    pub fn is_builtin(name: &str) -> bool {
        builtin_mirrors()
            .iter()
            .any(|mirror| mirror.name.eq_ignore_ascii_case(name))
    }
}

impl Default for MirrorCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// User mirror configuration persisted as `mirrors.toml` under the config root.
#[derive(Debug, Clone)]
pub struct MirrorStore {
    config_root: PathBuf,
}

impl MirrorStore {
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        Self {
            config_root: config_root.into(),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_root.join("mirrors.toml")
    }

    pub fn load_catalog(&self) -> Result<MirrorCatalog> {
        let state = self.load_state()?;
        let mut catalog = MirrorCatalog::builtin();
        catalog.mirrors.extend(state.mirrors);
        if let Some(default) = state.default {
            let name = catalog
                .find(&default)
                .with_context(|| {
                    format!(
                        "default mirror in {} is not configured",
                        self.config_path().display()
                    )
                })?
                .name
                .clone();
            catalog.default = name;
        }
        Ok(catalog)
    }

    pub fn add_mirror(&self, mirror: MirrorConfig) -> Result<()> {
        validate_user_mirror(&mirror)?;

        let mut state = self.load_state()?;
        if state
            .mirrors
            .iter()
            .any(|existing| existing.name.eq_ignore_ascii_case(&mirror.name))
        {
            anyhow::bail!("mirror '{}' already exists", mirror.name);
        }

        state.mirrors.push(mirror);
        sort_mirrors(&mut state.mirrors);
        self.save_state(&state)
    }

    pub fn remove_mirror(&self, name: &str) -> Result<()> {
        if MirrorCatalog::is_builtin(name) {
            anyhow::bail!("mirror '{name}' is built in and cannot be removed");
        }

        let mut state = self.load_state()?;
        let before = state.mirrors.len();
        state
            .mirrors
            .retain(|mirror| !mirror.name.eq_ignore_ascii_case(name));
        if state.mirrors.len() == before {
            anyhow::bail!("mirror '{name}' not found");
        }
        if state
            .default
            .as_deref()
            .is_some_and(|default| default.eq_ignore_ascii_case(name))
        {
            state.default = None;
        }
        self.save_state(&state)
    }

    /// `None` restores the built-in default.
    pub fn set_default(&self, name: Option<&str>) -> Result<()> {
        let mut state = self.load_state()?;
        state.default = match name {
            Some(name) => {
                let catalog = self.load_catalog()?;
                Some(catalog.find(name)?.name.clone())
            }
            None => None,
        };
        self.save_state(&state)
    }

    fn load_state(&self) -> Result<MirrorStateFile> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(MirrorStateFile::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed reading mirror config: {}", path.display()))?;
        let mut state = parse_mirror_state_file(&content)
            .with_context(|| format!("failed parsing mirror config: {}", path.display()))?;
        sort_mirrors(&mut state.mirrors);
        Ok(state)
    }

    fn save_state(&self, state: &MirrorStateFile) -> Result<()> {
        fs::create_dir_all(&self.config_root).with_context(|| {
            format!(
                "failed creating config root: {}",
                self.config_root.display()
            )
        })?;

        let path = self.config_path();
        let content = toml::to_string(state)
            .with_context(|| format!("failed serializing mirror config: {}", path.display()))?;
        fs::write(&path, content)
            .with_context(|| format!("failed writing mirror config: {}", path.display()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MirrorStateFile {
    #[serde(default = "state_file_version")]
    pub(crate) version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) default: Option<String>,
    #[serde(default)]
    pub(crate) mirrors: Vec<MirrorConfig>,
}

impl Default for MirrorStateFile {
    fn default() -> Self {
        Self {
            version: state_file_version(),
            default: None,
            mirrors: Vec::new(),
        }
    }
}

fn state_file_version() -> u32 {
    1
}

pub(crate) fn parse_mirror_state_file(content: &str) -> Result<MirrorStateFile> {
    let state: MirrorStateFile = toml::from_str(content)?;
    if state.version != state_file_version() {
        anyhow::bail!("unsupported mirror config version {}", state.version);
    }

    for (index, mirror) in state.mirrors.iter().enumerate() {
        validate_user_mirror(mirror)?;
        if state.mirrors[..index]
            .iter()
            .any(|earlier| earlier.name.eq_ignore_ascii_case(&mirror.name))
        {
            anyhow::bail!("duplicate mirror '{}'", mirror.name);
        }
    }
    Ok(state)
}

fn validate_user_mirror(mirror: &MirrorConfig) -> Result<(), CoreError> {
    validate_mirror_name(&mirror.name)?;
    validate_index_url(&mirror.index_url)?;
    if MirrorCatalog::is_builtin(&mirror.name) {
        return Err(CoreError::InvalidMirror {
            reason: format!("mirror name '{}' is reserved for a built-in mirror", mirror.name),
        });
    }
    Ok(())
}

fn sort_mirrors(mirrors: &mut [MirrorConfig]) {
    mirrors.sort_by(|left, right| left.name.cmp(&right.name));
}
