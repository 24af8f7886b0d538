//! Configuration management module.

use crate::export::ExportFormat;
use crate::models::AttendanceSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(AppConfig),
    /// Config file missing (first run).
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub attendance: AttendanceSettings,
    pub directory: DirectoryConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

/// ZKTeco terminal connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub ip: String,
    /// TCP port for binary protocol (default: 4370).
    #[serde(default = "default_tcp_port")]
    pub port: u16,
    /// Numeric comm key; 0 when the terminal has none.
    #[serde(default)]
    pub password: u32,
    /// TCP operation timeout in seconds (default: 5).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_tcp_port() -> u16 {
    4370
}

fn default_timeout_secs() -> u64 {
    5
}

/// Manual corrections to the names stored on the terminal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// User id (as written in the TOML key) to display name.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

/// Where and how reports are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_formats")]
    pub formats: Vec<ExportFormat>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_formats() -> Vec<ExportFormat> {
    vec![ExportFormat::Csv, ExportFormat::Json]
}

/// Log verbosity and file location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the daily log file; the platform data dir when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Get config file path (same directory as executable).
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(config),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.ip.trim().is_empty() {
            return Err(ConfigError::Validation("Device IP cannot be empty".to_string()));
        }
        if self.device.port == 0 {
            return Err(ConfigError::Validation("TCP port must be greater than 0".to_string()));
        }
        if self.device.timeout_secs < 1 {
            return Err(ConfigError::Validation(
                "TCP timeout must be at least 1 second".to_string(),
            ));
        }
        if self.attendance.grace_period_minutes > 1440 {
            return Err(ConfigError::Validation(
                "Grace period cannot exceed 1440 minutes".to_string(),
            ));
        }
        if let Some(key) = self.directory.overrides.keys().find(|k| k.trim().parse::<i64>().is_err()) {
            return Err(ConfigError::Validation(format!(
                "Directory override key '{key}' is not a numeric user id"
            )));
        }
        if self.export.formats.is_empty() {
            return Err(ConfigError::Validation(
                "At least one export format is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl DirectoryConfig {
    /// Overrides keyed by numeric user id; non-numeric keys are ignored.
    pub fn parsed(&self) -> BTreeMap<i64, String> {
        self.overrides
            .iter()
            .filter_map(|(id, name)| id.trim().parse::<i64>().ok().map(|id| (id, name.clone())))
            .collect()
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ip: "192.168.1.201".to_string(),
            port: default_tcp_port(),
            password: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            formats: default_formats(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}
