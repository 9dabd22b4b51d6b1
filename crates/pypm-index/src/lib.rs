mod client;
mod config;
mod mirrors;

pub use client::{IndexClientOptions, PackageIndex, PypiIndexClient, DEFAULT_PROJECT_BASE};
pub use config::default_config_root;
pub use mirrors::{MirrorCatalog, MirrorStore};

#[cfg(test)]
mod tests;
