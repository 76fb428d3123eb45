//! Configuration read/write operations
//!
//! A device keeps two small files:
//! - config.json: the `StreamConfig` edited by the user
//! - source-id: the stable identifier the backend knows this device by

use super::schema::StreamConfig;
use std::fs;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Environment variable overriding the backend URL
pub const BACKEND_URL_ENV: &str = "EDGE_UPLINK_BACKEND_URL";

/// Environment variable overriding the API key
pub const API_KEY_ENV: &str = "EDGE_UPLINK_API_KEY";

/// Config-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Read a config file, falling back to defaults when it does not exist
pub fn read_config(path: &Path) -> Result<StreamConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {:?}, using defaults", path);
        return Ok(StreamConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config: StreamConfig = serde_json::from_str(&content)?;
    config.validate().map_err(ConfigError::Invalid)?;

    tracing::debug!("Loaded config from {:?} (backend {})", path, config.backend_url);

    Ok(config)
}

/// Write a config file, creating parent directories as needed
pub fn write_config(config: &StreamConfig, path: &Path) -> Result<(), ConfigError> {
    config.validate().map_err(ConfigError::Invalid)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;

    tracing::debug!("Saved config to {:?}", path);

    Ok(())
}

/// Apply `EDGE_UPLINK_*` environment overrides on top of a loaded config
pub fn apply_env_overrides(config: &mut StreamConfig) {
    apply_overrides(
        config,
        std::env::var(BACKEND_URL_ENV).ok(),
        std::env::var(API_KEY_ENV).ok(),
    );
}

fn apply_overrides(
    config: &mut StreamConfig,
    backend_url: Option<String>,
    api_key: Option<String>,
) {
    if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
        config.backend_url = url;
    }
    if let Some(key) = api_key {
        config.api_key = if key.is_empty() { None } else { Some(key) };
    }
}

/// Return the persisted source id, generating and storing one on first use
pub fn load_or_create_source_id(path: &Path) -> Result<String, ConfigError> {
    if path.exists() {
        let existing = fs::read_to_string(path)?.trim().to_string();
        if !existing.is_empty() {
            return Ok(existing);
        }
        tracing::warn!("Source id file {:?} is empty, regenerating", path);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let source_id = Uuid::new_v4().to_string().to_uppercase();
    fs::write(path, &source_id)?;

    tracing::info!("Generated new source id {}", source_id);

    Ok(source_id)
}
