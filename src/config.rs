//! Tool configuration.
//!
//! Settings come from an optional TOML file with per-field defaults;
//! command-line flags override whatever the file said. The file is
//! looked up at `nacosctl.toml` unless a path is given explicitly.

use crate::error::{NacosctlError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_CONFIG_FILE: &str = "nacosctl.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ToolConfig {
    /// Directory under which clusters and standalone installs live.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Address nodes bind and advertise.
    #[serde(default = "default_ip")]
    pub ip: String,

    /// Server version used when none is given on the command line.
    #[serde(default = "default_version")]
    pub version: String,

    /// Default main port of the first node.
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Default cluster size.
    #[serde(default = "default_nodes")]
    pub nodes: u32,

    /// Package cache override; defaults to the user cache directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Machine-readable summaries instead of the colored report.
    #[serde(default)]
    pub json: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from("./nacos")
}

fn default_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_version() -> String {
    "3.0.2".to_string()
}

fn default_base_port() -> u16 {
    crate::ports::DEFAULT_MAIN_PORT
}

fn default_nodes() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            ip: default_ip(),
            version: default_version(),
            base_port: default_base_port(),
            nodes: default_nodes(),
            cache_dir: None,
            log_level: default_log_level(),
            json: false,
        }
    }
}

impl ToolConfig {
    /// Loads configuration from `path`, or from `nacosctl.toml` in the
    /// working directory when no path is given. An explicit path must
    /// exist; the implicit one silently falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => Self::parse_file(explicit),
            None => {
                let implicit = Path::new(DEFAULT_CONFIG_FILE);
                if implicit.exists() {
                    Self::parse_file(implicit)
                } else {
                    debug!("no config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            NacosctlError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| NacosctlError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }
}
