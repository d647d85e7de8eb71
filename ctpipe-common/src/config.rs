//! Configuration loading and data directory resolution
//!
//! Resolution order for every setting: command-line argument, environment
//! variable, TOML config file, compiled default.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents (`~/.config/ctpipe/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Directory holding the pipeline SQLite database and exports
    pub data_dir: Option<String>,

    /// Postgres connection URL for the upstream trial registry (AACT)
    pub aact_db_url: Option<String>,

    /// Anthropic API key for the classification engine
    pub anthropic_api_key: Option<String>,

    /// Model identifier for the classification engine
    pub anthropic_model: Option<String>,
}

/// Resolve the data directory following the priority order:
/// 1. Command-line argument (highest priority)
/// 2. `CTPIPE_DATA_DIR` environment variable
/// 3. TOML config file `data_dir` key
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_dir(cli_arg: Option<&str>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var("CTPIPE_DATA_DIR") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_dir {
        return PathBuf::from(path);
    }

    get_default_data_dir()
}

/// Get default configuration file path for the platform
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("ctpipe").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Load the TOML config file, returning defaults when the file is absent
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    tracing::debug!("Loading TOML config: {}", path.display());
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write the TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Get OS-dependent default data directory path
fn get_default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ctpipe"))
        .unwrap_or_else(|| PathBuf::from("./ctpipe_data"))
}
