//! Application configuration.
//!
//! Aggregates the engine's tunables into a single Config struct that can be
//! loaded from YAML files or environment variables.

mod limits;

pub use limits::{
    PoolLimits, RemoteLimits, DEFAULT_PROMOTION_THREADS, DEFAULT_PROMOTION_THRESHOLD,
    DEFAULT_REMOTE_BATCH_SIZE, DEFAULT_RULE_THREADS, DEFAULT_RULE_THRESHOLD,
};

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::utils::retry::{DEFAULT_CALLBACK_BASE_DELAY, DEFAULT_CALLBACK_MAX_ATTEMPTS};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "promote.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "PROMOTE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "PROMOTE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "PROMOTE_LOG";

/// Default ceiling on waiting for all validation rules to finish (30 minutes).
pub const DEFAULT_VALIDATION_TIMEOUT_SECS: u64 = 30 * 60;

/// Default callback request timeout.
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 30;

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Failed to read rule-set {path}: {reason}")]
    RuleSet { path: PathBuf, reason: String },

    #[error("Invalid rule-set '{name}': {reason}")]
    InvalidRuleSet { name: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Validation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Rule worker pool sizing.
    pub pool: PoolLimits,
    /// Ceiling on the drain wait, in seconds.
    pub timeout_secs: u64,
    /// Directory holding rule-set documents (JSON or YAML).
    pub rule_set_dir: Option<PathBuf>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            pool: PoolLimits::rules(),
            timeout_secs: DEFAULT_VALIDATION_TIMEOUT_SECS,
            rule_set_dir: None,
        }
    }
}

impl ValidationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Callback delivery configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Wait before the first redelivery, in milliseconds. Doubles per attempt.
    pub base_delay_ms: u64,
    /// Redelivery attempts before a callback is dropped.
    pub max_attempts: usize,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_CALLBACK_BASE_DELAY.as_millis() as u64,
            max_attempts: DEFAULT_CALLBACK_MAX_ATTEMPTS,
            timeout_secs: DEFAULT_CALLBACK_TIMEOUT_SECS,
        }
    }
}

impl CallbackConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Promotion/rollback worker pool sizing.
    pub pool: PoolLimits,
    /// Validation configuration.
    pub validation: ValidationConfig,
    /// Callback delivery configuration.
    pub callback: CallbackConfig,
    /// Remote re-hydration limits.
    pub remote: RemoteLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool: PoolLimits::promotion(),
            validation: ValidationConfig::default(),
            callback: CallbackConfig::default(),
            remote: RemoteLimits::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `promote.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Create config for testing: tiny callback delays, short validation ceiling.
    pub fn for_test() -> Self {
        Self {
            validation: ValidationConfig {
                timeout_secs: 5,
                ..Default::default()
            },
            callback: CallbackConfig {
                base_delay_ms: 10,
                max_attempts: 3,
                timeout_secs: 2,
            },
            ..Default::default()
        }
    }
}
