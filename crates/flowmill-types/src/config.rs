//! Engine configuration type.
//!
//! The engine reads a single JSON object at startup. Key names match the
//! on-disk format exactly (they contain spaces), so every field carries a
//! serde rename. Range checking and clamping happen in
//! `flowmill-infra::config::check_config`, not here.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default worker count when `max threads` is absent or out of range.
pub const DEFAULT_MAX_THREADS: u32 = 16;

/// Default driver sleep when `engine sleep time in run loop in ms` is absent
/// or out of range.
pub const DEFAULT_SLEEP_MS: u64 = 10;

/// Default queue file size limit when `max file size in kB` is absent or out
/// of range.
pub const DEFAULT_MAX_FILE_SIZE_KB: u64 = 20;

/// One upstream chat/API endpoint. Recognized and validated, but unused by
/// the orchestration core (ai_call executors would consume it).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiInterface {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub model: String,
}

/// Engine configuration loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding queue files; must exist.
    #[serde(rename = "queue folder")]
    pub queue_folder: PathBuf,

    /// Directory scanned for `*.jcwf` workflow documents; must exist.
    #[serde(rename = "workflows folder")]
    pub workflows_folder: PathBuf,

    /// Worker thread count for task dispatch (1..=256).
    #[serde(rename = "max threads", default = "default_max_threads")]
    pub max_threads: u32,

    /// Driver sleep between run-loop iterations in milliseconds (1..=256).
    #[serde(
        rename = "engine sleep time in run loop in ms",
        default = "default_sleep_ms"
    )]
    pub sleep_ms: u64,

    /// Maximum queue file size in kB (1..=256).
    #[serde(rename = "max file size in kB", default = "default_max_file_size_kb")]
    pub max_file_size_kb: u64,

    #[serde(default)]
    pub verbose: bool,

    /// Upstream API endpoints; optional for the orchestration core.
    #[serde(rename = "API interfaces", default)]
    pub api_interfaces: Vec<ApiInterface>,

    /// Index into `api_interfaces` selecting the active endpoint.
    #[serde(rename = "API index", default)]
    pub api_index: usize,
}

fn default_max_threads() -> u32 {
    DEFAULT_MAX_THREADS
}

fn default_sleep_ms() -> u64 {
    DEFAULT_SLEEP_MS
}

fn default_max_file_size_kb() -> u64 {
    DEFAULT_MAX_FILE_SIZE_KB
}

impl EngineConfig {
    /// The driver sleep as a `Duration`.
    pub fn sleep_duration(&self) -> Duration {
        Duration::from_millis(self.sleep_ms)
    }
}
