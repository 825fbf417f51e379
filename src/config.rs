use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Names a YAML file to load the configuration from.
pub const CONFIG_ENV: &str = "PICOHTTPD_CONFIG";
/// Overrides `listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    /// Block in `accept` when true; poll with a zero-timeout check otherwise.
    pub blocking: bool,
    /// Sleep between empty polls in non-blocking mode.
    pub poll_interval_ms: u64,
    /// Directory static files are served from. No static files without it.
    pub doc_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            blocking: true,
            poll_interval_ms: 10,
            doc_root: None,
        }
    }
}

impl Config {
    /// Loads the file named by `PICOHTTPD_CONFIG` if set, then applies the
    /// `LISTEN` override.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var(LISTEN_ENV) {
            cfg.listen_addr = listen_addr;
        }

        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("invalid configuration")
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("in config file {}", path.display()))
    }
}
