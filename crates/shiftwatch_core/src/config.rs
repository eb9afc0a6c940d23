//! Engine settings persisted as `settings.json`.
//!
//! # Responsibility
//! - Describe database, logging and poll-loop configuration.
//! - Load/save settings from an application config directory.
//!
//! # Invariants
//! - `load()` never fails; missing or unreadable files fall back to defaults.
//! - `try_load()` and `save()` reject settings that fail `validate()`.

use crate::model::alert::AlertDefinitionInput;
use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = "settings.json";
const DEFAULT_DB_FILE_NAME: &str = "shiftwatch.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "settings io `{}`: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "settings parse `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid settings: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Hours during which scheduled ticks evaluate, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for ActiveWindow {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Absolute directory for rolling log files; `None` disables file logs.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    #[serde(default)]
    pub active_window: ActiveWindow,
    /// Site-specific alerts registered on top of the built-in list.
    #[serde(default)]
    pub custom_alerts: Vec<AlertDefinitionInput>,
}

fn default_log_level() -> String {
    crate::logging::default_log_level().to_string()
}

fn default_poll_interval_seconds() -> u64 {
    30
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level(),
            log_dir: None,
            poll_interval_seconds: default_poll_interval_seconds(),
            active_window: ActiveWindow::default(),
            custom_alerts: Vec::new(),
        }
    }
}

impl EngineSettings {
    /// Defaults rooted in `dir` (database file next to `settings.json`).
    pub fn default_in(dir: &Path) -> Self {
        Self {
            db_path: dir.join(DEFAULT_DB_FILE_NAME),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_seconds must be positive".to_string(),
            ));
        }
        let window = self.active_window;
        if window.start_hour > 23 || window.end_hour > 23 {
            return Err(ConfigError::Invalid(format!(
                "active window hours must be 0..=23, got {}-{}",
                window.start_hour, window.end_hour
            )));
        }
        if window.start_hour > window.end_hour {
            return Err(ConfigError::Invalid(format!(
                "active window starts after it ends: {}-{}",
                window.start_hour, window.end_hour
            )));
        }
        Ok(())
    }
}

pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(app_config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = app_config_dir.into();
        Self {
            config_path: config_dir.join(SETTINGS_FILE_NAME),
            config_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads settings, falling back to defaults on any failure.
    pub fn load(&self) -> EngineSettings {
        match self.try_load() {
            Ok(settings) => settings,
            Err(err) => {
                warn!("event=config_load module=config status=error fallback=defaults error={err}");
                EngineSettings::default_in(&self.config_dir)
            }
        }
    }

    /// Loads settings strictly; a missing file yields defaults.
    pub fn try_load(&self) -> Result<EngineSettings, ConfigError> {
        if !self.config_path.exists() {
            return Ok(EngineSettings::default_in(&self.config_dir));
        }
        let content = fs::read_to_string(&self.config_path).map_err(|source| ConfigError::Io {
            path: self.config_path.clone(),
            source,
        })?;
        let settings: EngineSettings =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: self.config_path.clone(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, settings: &EngineSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        let io_error = |source| ConfigError::Io {
            path: self.config_path.clone(),
            source,
        };
        fs::create_dir_all(&self.config_dir).map_err(io_error)?;
        let content = serde_json::to_string_pretty(settings)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        fs::write(&self.config_path, content).map_err(io_error)
    }
}
