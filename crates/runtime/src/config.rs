//! Runtime configuration: channels, AI settings, persistence.
//!
//! Environment variables are read once at startup (a `.env` file is
//! honoured when present). No other process-global state exists.

use std::path::PathBuf;
use std::time::Duration;

/// Channel and session plumbing configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub command_buffer_size: usize,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
            event_buffer_size: 100,
        }
    }
}

/// Writer/Checker model configuration and pacing.
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub provider: String,
    pub writer_model: String,
    pub checker_model: String,
    /// Deadline applied to each Writer/Checker call.
    pub deadline: Duration,
    /// AI turns between narrative-summary refreshes.
    pub summary_interval: u32,
    /// Narrative turns included verbatim in the envelope.
    pub history_window: usize,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: "mock".into(),
            writer_model: "writer-default".into(),
            checker_model: "checker-default".into(),
            deadline: Duration::from_secs(60),
            summary_interval: 8,
            history_window: 6,
        }
    }
}

impl AiSettings {
    /// Build settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut settings = Self::default();
        if let Ok(v) = std::env::var("PLOTPLAY_AI_PROVIDER") {
            settings.provider = v;
        }
        if let Ok(v) = std::env::var("PLOTPLAY_WRITER_MODEL") {
            settings.writer_model = v;
        }
        if let Ok(v) = std::env::var("PLOTPLAY_CHECKER_MODEL") {
            settings.checker_model = v;
        }
        if let Ok(v) = std::env::var("PLOTPLAY_AI_DEADLINE_SECS")
            && let Ok(secs) = v.parse::<u64>()
        {
            settings.deadline = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("PLOTPLAY_SUMMARY_INTERVAL")
            && let Ok(n) = v.parse::<u32>()
        {
            settings.summary_interval = n.max(1);
        }
        settings
    }
}

/// Where per-session snapshots are written.
#[derive(Debug, Clone)]
pub struct PersistenceSettings {
    pub enabled: bool,
    pub base_dir: PathBuf,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_dir: Self::default_data_dir(),
        }
    }
}

impl PersistenceSettings {
    /// Platform data directory (`~/.local/share/plotplay` on Linux), with
    /// a current-directory fallback.
    pub fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("PLOTPLAY_DATA_DIR") {
            return PathBuf::from(dir);
        }
        directories::ProjectDirs::from("", "", "plotplay")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./plotplay_data"))
    }
}
