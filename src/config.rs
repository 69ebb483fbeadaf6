//! Loader configuration.
//!
//! The toolkit ships a `loader.toml` next to its agent binary.  The
//! `[driver]` block names the kernel module this crate manages; the
//! `[logging]` block feeds [`crate::logging::init`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// `[driver]` block: which kernel module to manage.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    /// Service name the registry entry is keyed by.
    pub name: String,
    /// User-mode path to the `.sys` image.
    pub image_path: PathBuf,
}

/// `[logging]` block, in the same shape the agent's master config uses.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_enable")]
    pub enable: bool,
    #[serde(default = "default_level")]
    pub level: String,
    /// Log file name, relative to the agent directory.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable: default_enable(),
            level: default_level(),
            file: None,
        }
    }
}

fn default_enable() -> bool {
    true
}

fn default_level() -> String {
    "INFO".to_string()
}

/// Top-level `loader.toml` structure.
#[derive(Debug, Deserialize)]
pub struct LoaderConfig {
    pub driver: DriverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Load and parse the loader configuration from `path`.
pub fn load_loader_config(path: &Path) -> anyhow::Result<LoaderConfig> {
    log::debug!("reading loader config from {:?}", path);
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let cfg: LoaderConfig =
        toml::from_str(&text).with_context(|| format!("cannot parse {}", path.display()))?;
    log::info!("loaded loader config from {:?}", path);
    Ok(cfg)
}
