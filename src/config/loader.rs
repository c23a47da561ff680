//! Configuration loading.
//!
//! Layers, lowest priority first:
//! 1. Built-in defaults
//! 2. YAML file named by `DEVPROV_CONFIG`
//! 3. `DEVPROV_ROOT` overriding the root directory

use crate::config::schema::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an override file.
pub const CONFIG_ENV: &str = "DEVPROV_CONFIG";

/// Environment variable overriding the root directory.
pub const ROOT_ENV: &str = "DEVPROV_ROOT";

/// Load configuration from the process environment.
pub fn load_config() -> Result<ProvisionConfig> {
    let file = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let root = std::env::var_os(ROOT_ENV).map(PathBuf::from);
    load_config_from(file.as_deref(), root)
}

/// Load configuration from explicit sources.
///
/// A named file that does not exist is an error.
pub fn load_config_from(file: Option<&Path>, root: Option<PathBuf>) -> Result<ProvisionConfig> {
    let mut config = match file {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            let content = fs::read_to_string(path)?;
            parse_config(&content, path)?
        }
        None => ProvisionConfig::default(),
    };

    if let Some(root) = root {
        config.root = root;
    }
    Ok(config)
}

/// Parse YAML configuration content.
pub fn parse_config(content: &str, path: &Path) -> Result<ProvisionConfig> {
    if content.trim().is_empty() {
        return Ok(ProvisionConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| ProvisionError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
