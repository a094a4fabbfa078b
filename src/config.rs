//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `PATTERNLOG_*` environment overrides.

use crate::cascade::CascadeConfig;
use crate::discovery::AggregationConfig;
use crate::engine::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub cascade: CascadeSettings,

    #[serde(default)]
    pub discovery: DiscoverySettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pattern store configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("patternlog").to_string_lossy().to_string())
        .unwrap_or_else(|| "./patternlog_data".to_string())
}

fn default_database_file() -> String {
    "patterns.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
        }
    }
}

impl StorageConfig {
    /// Data directory with a leading `~/` expanded
    pub fn data_path(&self) -> PathBuf {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.data_dir)),
            None => PathBuf::from(&self.data_dir),
        }
    }

    /// Full path to the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_path().join(&self.database_file)
    }
}

/// Cascade linking configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CascadeSettings {
    #[serde(default = "default_link_window")]
    pub link_window_minutes: i64,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_link_window() -> i64 {
    360 // 6 hours
}

fn default_min_confidence() -> f64 {
    0.3
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            link_window_minutes: default_link_window(),
            min_confidence: default_min_confidence(),
            utc_offset_minutes: 0,
        }
    }
}

/// Discovery thresholds
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DiscoverySettings {
    #[serde(default = "default_min_occurrences")]
    pub min_occurrences: usize,

    #[serde(default = "default_developing_at")]
    pub developing_at: usize,

    #[serde(default = "default_strong_at")]
    pub strong_at: usize,

    /// Default lookback for discoveries; unset means all history
    #[serde(default)]
    pub window_days: Option<i64>,
}

fn default_min_occurrences() -> usize {
    2
}

fn default_developing_at() -> usize {
    4
}

fn default_strong_at() -> usize {
    6
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            min_occurrences: default_min_occurrences(),
            developing_at: default_developing_at(),
            strong_at: default_strong_at(),
            window_days: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("patternlog").join("config.toml")),
            Some(PathBuf::from("./patternlog.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Storage overrides
        if let Some(data_dir) = lookup("PATTERNLOG_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }
        if let Some(file) = lookup("PATTERNLOG_DATABASE_FILE") {
            self.storage.database_file = file;
        }

        // Cascade overrides
        if let Some(v) = lookup("PATTERNLOG_LINK_WINDOW_MINUTES").and_then(|v| v.parse().ok()) {
            self.cascade.link_window_minutes = v;
        }
        if let Some(v) = lookup("PATTERNLOG_MIN_CONFIDENCE").and_then(|v| v.parse().ok()) {
            self.cascade.min_confidence = v;
        }
        if let Some(v) = lookup("PATTERNLOG_UTC_OFFSET_MINUTES").and_then(|v| v.parse().ok()) {
            self.cascade.utc_offset_minutes = v;
        }

        // Discovery overrides
        if let Some(v) = lookup("PATTERNLOG_DISCOVERY_WINDOW_DAYS").and_then(|v| v.parse().ok()) {
            self.discovery.window_days = Some(v);
        }

        // Logging overrides
        if let Some(level) = lookup("PATTERNLOG_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("PATTERNLOG_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Reject settings the engine cannot use
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.discovery;
        if d.min_occurrences < 2 {
            return Err(ConfigError::Invalid(
                "discovery.min_occurrences must be at least 2".into(),
            ));
        }
        if !(d.min_occurrences <= d.developing_at && d.developing_at <= d.strong_at) {
            return Err(ConfigError::Invalid(format!(
                "discovery thresholds out of order: min_occurrences={} developing_at={} strong_at={}",
                d.min_occurrences, d.developing_at, d.strong_at
            )));
        }
        if matches!(d.window_days, Some(days) if days <= 0) {
            return Err(ConfigError::Invalid("discovery.window_days must be positive".into()));
        }

        let c = &self.cascade;
        if c.link_window_minutes < 0 {
            return Err(ConfigError::Invalid(
                "cascade.link_window_minutes must not be negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&c.min_confidence) {
            return Err(ConfigError::Invalid(
                "cascade.min_confidence must be within [0, 1]".into(),
            ));
        }
        // chrono accepts offsets strictly inside ±24h
        if c.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid(
                "cascade.utc_offset_minutes must be within ±1439".into(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Engine settings derived from this config
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            cascade: CascadeConfig {
                link_window_ms: self.cascade.link_window_minutes * 60 * 1000,
                min_confidence: self.cascade.min_confidence,
                utc_offset_minutes: self.cascade.utc_offset_minutes,
            },
            aggregation: AggregationConfig {
                min_occurrences: self.discovery.min_occurrences,
                developing_at: self.discovery.developing_at,
                strong_at: self.discovery.strong_at,
            },
            discovery_window_days: self.discovery.window_days,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Patternlog Configuration
#
# Environment variables override these settings:
# - PATTERNLOG_DATA_DIR
# - PATTERNLOG_DATABASE_FILE
# - PATTERNLOG_LINK_WINDOW_MINUTES
# - PATTERNLOG_MIN_CONFIDENCE
# - PATTERNLOG_UTC_OFFSET_MINUTES
# - PATTERNLOG_DISCOVERY_WINDOW_DAYS
# - PATTERNLOG_LOG_LEVEL
# - PATTERNLOG_LOG_FORMAT

[storage]
# Directory for the pattern database
data_dir = "~/.local/share/patternlog"

# SQLite file name inside data_dir
database_file = "patterns.db"

[cascade]
# How far back a new pattern looks for earlier patterns to link (minutes)
link_window_minutes = 360

# Scored links below this confidence are not created
min_confidence = 0.3

# Offset from UTC used to decide which calendar day a cascade falls on
utc_offset_minutes = 0

[discovery]
# Occurrences needed before a pattern becomes a discovery (at least 2)
min_occurrences = 2

# Occurrences for the "developing" tier
developing_at = 4

# Occurrences for the "strong" tier
strong_at = 6

# Default lookback in days (omit for all history)
# window_days = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/patternlog/patternlog.log"
"#
    .to_string()
}
