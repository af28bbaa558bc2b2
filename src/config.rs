use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Data directory name under the home directory
pub const DATA_DIR_NAME: &str = ".etime";

/// Environment override for the data directory
pub const DATA_DIR_ENV: &str = "ETIME_DIR";

pub const ACTIVE_FILE_NAME: &str = "active.json";
pub const HISTORY_FILE_NAME: &str = "history.jsonl";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = "etime.log";

/// Default tick interval in milliseconds
pub const DEFAULT_TICK_MS: u64 = 100;

/// Wall-clock gap between ticks treated as a system sleep
pub const DEFAULT_SLEEP_GAP_SECS: u64 = 30;

pub const DEFAULT_TASK_MINUTES: u32 = 15;
pub const MIN_TASK_MINUTES: u32 = 1;
pub const MAX_TASK_MINUTES: u32 = 999;

/// User settings stored in config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tick_ms: u64,
    pub sleep_gap_secs: u64,
    pub default_minutes: u32,
    pub notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            sleep_gap_secs: DEFAULT_SLEEP_GAP_SECS,
            default_minutes: DEFAULT_TASK_MINUTES,
            notifications: true,
        }
    }
}

impl Settings {
    /// Tick period; a zero value in the file falls back to the default
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(if self.tick_ms == 0 { DEFAULT_TICK_MS } else { self.tick_ms })
    }

    /// Fixed elapsed-time increment applied on every tick, in seconds
    pub fn tick_increment_secs(&self) -> f64 {
        self.tick_duration().as_millis() as f64 / 1000.0
    }

    pub fn sleep_gap(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.sleep_gap_secs.max(1) as i64)
    }

    pub fn default_minutes(&self) -> u32 {
        self.default_minutes.clamp(MIN_TASK_MINUTES, MAX_TASK_MINUTES)
    }
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub settings: Settings,
}

impl Config {
    /// Resolve the data directory and load settings from it
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = resolve_data_dir(data_dir)?;
        let settings = load_settings(data_dir.join(CONFIG_FILE_NAME));
        Ok(Self { data_dir, settings })
    }

    pub fn active_file(&self) -> PathBuf {
        self.data_dir.join(ACTIVE_FILE_NAME)
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE_NAME)
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }
}

/// Pick the data directory: explicit flag, then $ETIME_DIR, then ~/.etime
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }

    if let Ok(dir) = env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(DATA_DIR_NAME))
}

/// Load settings from config.json; missing or malformed files give defaults
pub fn load_settings<P: AsRef<Path>>(path: P) -> Settings {
    let path = path.as_ref();

    if !path.exists() {
        return Settings::default();
    }

    let parsed = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))
        .and_then(|content| {
            serde_json::from_str::<Settings>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))
        });

    match parsed {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("{:#}, using default settings", e);
            Settings::default()
        }
    }
}
