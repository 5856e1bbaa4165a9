//! Engine configuration loading and checking.
//!
//! The config file is a single JSON object (see
//! [`EngineConfig`](flowmill_types::config::EngineConfig) for the key
//! names). Loading is strict about required fields; `check_config` then
//! verifies the directories exist, clamps out-of-range optional values
//! with a warning, and validates API interface entries when present.

use std::path::Path;

use thiserror::Error;

use flowmill_types::config::EngineConfig;

/// Errors raised while loading or checking the engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config JSON: {0}")]
    Parse(String),

    #[error("config error: {field} '{path}' is not a directory")]
    NotADirectory { field: &'static str, path: String },

    #[error("config error: invalid API interface: {0}")]
    InvalidApiInterface(String),
}

/// Read and deserialize the engine configuration from `path`.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Validate required fields and clamp optional ones into range.
///
/// Missing or invalid required directories abort startup; out-of-range
/// optional values are clamped into `1..=256` with a warning.
pub fn check_config(config: &mut EngineConfig) -> Result<(), ConfigError> {
    if !config.queue_folder.is_dir() {
        return Err(ConfigError::NotADirectory {
            field: "queue folder",
            path: config.queue_folder.display().to_string(),
        });
    }

    if !config.workflows_folder.is_dir() {
        return Err(ConfigError::NotADirectory {
            field: "workflows folder",
            path: config.workflows_folder.display().to_string(),
        });
    }

    if !(1..=256).contains(&config.max_threads) {
        tracing::warn!(
            value = config.max_threads,
            "'max threads' out of range 1..=256, clamping"
        );
        config.max_threads = config.max_threads.clamp(1, 256);
    }

    if !(1..=256).contains(&config.sleep_ms) {
        tracing::warn!(
            value = config.sleep_ms,
            "'engine sleep time in run loop in ms' out of range 1..=256, clamping"
        );
        config.sleep_ms = config.sleep_ms.clamp(1, 256);
    }

    if !(1..=256).contains(&config.max_file_size_kb) {
        tracing::warn!(
            value = config.max_file_size_kb,
            "'max file size in kB' out of range 1..=256, clamping"
        );
        config.max_file_size_kb = config.max_file_size_kb.clamp(1, 256);
    }

    if config.api_interfaces.is_empty() {
        tracing::warn!("no API interfaces configured; ai_call tasks will not run");
    } else {
        if config.api_index >= config.api_interfaces.len() {
            return Err(ConfigError::InvalidApiInterface(format!(
                "'API index' {} out of range for {} interfaces",
                config.api_index,
                config.api_interfaces.len()
            )));
        }

        let active = &config.api_interfaces[config.api_index];
        if !active.url.starts_with("https://") || active.url.len() <= "https://".len() {
            return Err(ConfigError::InvalidApiInterface(format!(
                "url '{}' must be a non-empty https:// address",
                active.url
            )));
        }
        if active.model.is_empty() {
            return Err(ConfigError::InvalidApiInterface(
                "no model provided".to_string(),
            ));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
