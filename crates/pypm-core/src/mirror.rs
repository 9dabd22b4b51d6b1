use serde::{Deserialize, Serialize};

use crate::CoreError;

pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/simple";
pub const DEFAULT_MIRROR_NAME: &str = "pypi";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub name: String,
    pub index_url: String,
}

impl MirrorConfig {
    pub fn new(name: impl Into<String>, index_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index_url: index_url.into(),
        }
    }

    pub fn pypi() -> Self {
        Self::new(DEFAULT_MIRROR_NAME, DEFAULT_INDEX_URL)
    }

    /// The installer's own default index needs no `-i` override.
    pub fn is_default_index(&self) -> bool {
        self.index_url.trim_end_matches('/') == DEFAULT_INDEX_URL
    }

    /// Host (with port, if any) of a plain-http index; pip refuses those unless
    /// they are explicitly trusted.
    pub fn trusted_host(&self) -> Option<&str> {
        let rest = self.index_url.strip_prefix("http://")?;
        let host = rest.split('/').next().unwrap_or(rest);
        (!host.is_empty()).then_some(host)
    }
}

pub fn builtin_mirrors() -> Vec<MirrorConfig> {
    vec![
        MirrorConfig::pypi(),
        MirrorConfig::new("tsinghua", "https://pypi.tuna.tsinghua.edu.cn/simple"),
        MirrorConfig::new("ustc", "https://pypi.mirrors.ustc.edu.cn/simple"),
        MirrorConfig::new("aliyun", "http://mirrors.aliyun.com/pypi/simple"),
    ]
}

pub fn validate_mirror_name(name: &str) -> Result<(), CoreError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > 64 {
        return Err(CoreError::InvalidMirror {
            reason: format!("mirror name '{name}' must be 1-64 characters"),
        });
    }

    let starts_valid = bytes[0].is_ascii_alphanumeric();
    let rest_valid = bytes[1..]
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || b"._-".contains(b));
    if !(starts_valid && rest_valid) {
        return Err(CoreError::InvalidMirror {
            reason: format!(
                "mirror name '{name}' must start with a letter or digit and use only letters, digits, '.', '_' or '-'"
            ),
        });
    }
    Ok(())
}

pub fn validate_index_url(url: &str) -> Result<(), CoreError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    let valid = rest.is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'))
        && !url.contains(char::is_whitespace);
    if !valid {
        return Err(CoreError::InvalidMirror {
            reason: format!("index url '{url}' must be an http:// or https:// url"),
        });
    }
    Ok(())
}
