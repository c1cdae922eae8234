use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project directory holding config files and, by default, the database.
pub const CONFIG_DIR: &str = ".agora";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid scheduler interval: min_interval_secs ({0}) must not exceed max_interval_secs ({1})")]
    InvalidInterval(u64, u64),

    #[error("Invalid max_interval_secs: must be greater than 0")]
    ZeroMaxInterval,

    #[error("Invalid turns: {0}. Must be at least 1")]
    InvalidTurns(u32),

    #[error("Invalid message_pace_secs: {0}. Must be a non-negative number")]
    InvalidMessagePace(f64),

    #[error("Channel name cannot be empty")]
    EmptyChannelName,

    #[error("Invalid sync_interval_secs: must be greater than 0")]
    ZeroSyncInterval,

    #[error("LLM model cannot be empty")]
    EmptyModel,

    #[error("Invalid temperature: {0}. Must be between 0 and 2")]
    InvalidTemperature(f32),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .agora/config.yaml
    /// 3. .agora/local.yaml (optional, for machine-specific overrides)
    /// 4. Environment variables (AGORA_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        Self::load_in(".")
    }

    /// Load configuration rooted at `project_dir` instead of the current directory.
    pub fn load_in(project_dir: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Self::figment(project_dir.as_ref())
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(project_dir: &Path) -> Figment {
        let dir = project_dir.join(CONFIG_DIR);
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("AGORA_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        let scheduler = &config.scheduler;
        if scheduler.max_interval_secs == 0 {
            return Err(ConfigError::ZeroMaxInterval);
        }
        if scheduler.min_interval_secs > scheduler.max_interval_secs {
            return Err(ConfigError::InvalidInterval(scheduler.min_interval_secs, scheduler.max_interval_secs));
        }
        if scheduler.turns == 0 {
            return Err(ConfigError::InvalidTurns(scheduler.turns));
        }
        if !scheduler.message_pace_secs.is_finite() || scheduler.message_pace_secs < 0.0 {
            return Err(ConfigError::InvalidMessagePace(scheduler.message_pace_secs));
        }

        if config.fleet.channel_name.trim().is_empty() {
            return Err(ConfigError::EmptyChannelName);
        }
        if config.fleet.sync_interval_secs == 0 {
            return Err(ConfigError::ZeroSyncInterval);
        }

        if config.llm.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        if !(0.0..=2.0).contains(&config.llm.temperature) {
            return Err(ConfigError::InvalidTemperature(config.llm.temperature));
        }

        Ok(())
    }
}
