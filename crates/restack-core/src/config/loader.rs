//! Configuration file discovery and environment overrides
//!
//! Precedence (low to high):
//! 1. Built-in defaults
//! 2. `<config_dir>/restack/restack.yaml`
//! 3. `./restack.yaml`
//! 4. An explicit `--config` path (replaces 2 and 3)
//! 5. `RESTACK_*` environment variables

use super::RestackConfig;
use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::fs;

/// Name of the configuration file searched for on disk
pub const CONFIG_FILE_NAME: &str = "restack.yaml";

/// Locates and loads `restack.yaml`
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    search_paths: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Loader that searches the working directory, then the user config dir
    pub fn new() -> Self {
        let mut search_paths = vec![Utf8PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir().and_then(|d| Utf8PathBuf::from_path_buf(d).ok()) {
            search_paths.push(dir.join("restack").join(CONFIG_FILE_NAME));
        }
        Self { search_paths }
    }

    /// Loader with an explicit search list, first match wins
    pub fn with_search_paths(search_paths: Vec<Utf8PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Load configuration
    ///
    /// An explicit path must exist; searched paths are optional.
    pub fn load(&self, explicit: Option<&Utf8Path>) -> Result<RestackConfig> {
        let config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::config(format!("config file not found: {}", path)));
                }
                Self::read(path)?
            }
            None => match self.search_paths.iter().find(|p| p.exists()) {
                Some(path) => Self::read(path)?,
                None => {
                    tracing::debug!("no {} found, using defaults", CONFIG_FILE_NAME);
                    RestackConfig::default()
                }
            },
        };

        apply_env_overrides(config)
    }

    fn read(path: &Utf8Path) -> Result<RestackConfig> {
        tracing::debug!("loading configuration from {}", path);
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::config(format!("failed to parse {}: {}", path, e)))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl RestackConfig {
    /// Load using the default search order
    pub fn load(explicit: Option<&Utf8Path>) -> Result<Self> {
        ConfigLoader::new().load(explicit)
    }
}

fn apply_env_overrides(mut config: RestackConfig) -> Result<RestackConfig> {
    if let Some(val) = non_empty_var("RESTACK_PORTAINER_URL") {
        config.management_ui.url = val;
    }

    if let Some(val) = non_empty_var("RESTACK_PLATFORM_URL") {
        config.platform.url = Some(val);
    }

    if let Some(val) = non_empty_var("RESTACK_DOCKER_BIN") {
        config.runtime.docker_bin = val;
    }

    if let Some(val) = non_empty_var("RESTACK_HELPER_IMAGE") {
        config.runtime.helper_image = val;
    }

    if let Some(val) = non_empty_var("RESTACK_STACK_WAIT_SECS") {
        config.readiness.stack_wait_secs = val
            .parse()
            .map_err(|_| Error::config("RESTACK_STACK_WAIT_SECS must be a valid number"))?;
    }

    Ok(config)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
