use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for Agora
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Conversation scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Fleet and shared channel configuration
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Text generation backend configuration
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".agora/agora.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// `sqlx` connection URL for the configured path.
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation policy for file logs: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Conversation scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Shortest wait between two scheduled conversations, in seconds
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,

    /// Longest wait between two scheduled conversations, in seconds
    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,

    /// Turns per conversation (each turn is two messages)
    #[serde(default = "default_turns")]
    pub turns: u32,

    /// Delay after each delivered message, in seconds
    #[serde(default = "default_message_pace_secs")]
    pub message_pace_secs: f64,

    /// Delay before the first iteration so the fleet can connect
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,
}

const fn default_min_interval_secs() -> u64 {
    30
}

const fn default_max_interval_secs() -> u64 {
    120
}

const fn default_turns() -> u32 {
    4
}

const fn default_message_pace_secs() -> f64 {
    2.0
}

const fn default_startup_delay_secs() -> u64 {
    5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            max_interval_secs: default_max_interval_secs(),
            turns: default_turns(),
            message_pace_secs: default_message_pace_secs(),
            startup_delay_secs: default_startup_delay_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs)
    }

    pub fn message_pace(&self) -> Duration {
        Duration::from_secs_f64(self.message_pace_secs.max(0.0))
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }
}

/// Fleet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FleetConfig {
    /// Name of the shared channel every agent joins
    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    /// How long `stop_agent` waits for a handle's task before aborting it
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// How often `serve` reconciles running handles with stored agents
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
}

fn default_channel_name() -> String {
    "the-marketplace".to_string()
}

const fn default_shutdown_grace_ms() -> u64 {
    5000
}

const fn default_sync_interval_secs() -> u64 {
    10
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            channel_name: default_channel_name(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            sync_interval_secs: default_sync_interval_secs(),
        }
    }
}

impl FleetConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

/// Text generation backend configuration (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// API base URL (for proxies and compatible servers)
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model used for agent replies and grading
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// API key (can also be set via `OPENAI_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Max tokens per agent reply
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for agent replies
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_llm_max_tokens() -> u32 {
    256
}

const fn default_llm_temperature() -> f32 {
    0.8
}

const fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Get API key from config or environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}
