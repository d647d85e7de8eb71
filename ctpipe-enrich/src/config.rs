//! Configuration resolution for the enrichment pipeline
//!
//! Every setting resolves ENV → TOML → default. When a value is present in
//! multiple sources the highest-priority one wins and the duplication is
//! logged as a potential misconfiguration.

use ctpipe_common::config::TomlConfig;
use tracing::{info, warn};

/// Default model for the classification engine
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20250929";

/// Resolve the Anthropic API key (ENV → TOML)
///
/// Returns `None` when unconfigured; the classification engine is simply
/// unavailable in that case.
pub fn resolve_anthropic_api_key(toml_config: &TomlConfig) -> Option<String> {
    let env_key = std::env::var("ANTHROPIC_API_KEY")
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .anthropic_api_key
        .clone()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!("Anthropic API key found in both environment and TOML; using environment");
    }

    if let Some(key) = env_key {
        info!("Anthropic API key loaded from environment variable");
        return Some(key);
    }

    if let Some(key) = toml_key {
        info!("Anthropic API key loaded from TOML config");
        return Some(key);
    }

    None
}

/// Resolve the classification model identifier (ENV → TOML → default)
pub fn resolve_anthropic_model(toml_config: &TomlConfig) -> String {
    if let Ok(model) = std::env::var("CTPIPE_ANTHROPIC_MODEL") {
        if !model.trim().is_empty() {
            return model;
        }
    }

    toml_config
        .anthropic_model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string())
}

/// Resolve the upstream registry database URL (ENV → TOML)
pub fn resolve_aact_db_url(toml_config: &TomlConfig) -> Option<String> {
    let env_url = std::env::var("CTPIPE_AACT_DB_URL")
        .ok()
        .filter(|u| !u.trim().is_empty());
    let toml_url = toml_config
        .aact_db_url
        .clone()
        .filter(|u| !u.trim().is_empty());

    if env_url.is_some() && toml_url.is_some() {
        warn!("Registry database URL found in both environment and TOML; using environment");
    }

    env_url.or(toml_url)
}

/// Validate an API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
