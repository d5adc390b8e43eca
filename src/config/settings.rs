use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    DirectoryNotFound,

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub limits: Limits,
    pub history: HistoryLimits,
    pub policy: PolicySource,
    pub audit: AuditConfig,
}

/// Execution limits for one batch
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Limits {
    /// Candidates beyond this count are dropped before validation
    pub max_commands: usize,
    /// Per-stream byte cap for stdout and stderr
    pub max_output_per_command: usize,
    /// Aggregate byte budget across the batch
    pub max_total_output: usize,
    pub command_timeout_secs: u64,
    pub max_parallel: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_commands: 100,
            max_output_per_command: 10_000,
            max_total_output: 200_000,
            command_timeout_secs: 30,
            max_parallel: 10,
        }
    }
}

impl Limits {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// How much iteration history is fed back to the generator
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct HistoryLimits {
    pub max_accepted: usize,
    pub max_rejected: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_accepted: 50,
            max_rejected: 20,
        }
    }
}

/// Where the security policy comes from
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct PolicySource {
    /// TOML policy file; the built-in read-only policy is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::DirectoryNotFound)?;
        Ok(PathBuf::from(home).join(".config").join("ripper"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, falling back to defaults
    /// when no file exists
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default_config());
        }

        Self::load_from(&path)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Config::default()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;

        if limits.max_commands == 0 {
            return Err(ConfigError::InvalidValue(
                "max_commands must be greater than 0".to_string(),
            ));
        }

        if limits.max_output_per_command == 0 {
            return Err(ConfigError::InvalidValue(
                "max_output_per_command must be greater than 0".to_string(),
            ));
        }

        if limits.max_total_output < limits.max_output_per_command {
            return Err(ConfigError::InvalidValue(format!(
                "max_total_output ({}) must be at least max_output_per_command ({})",
                limits.max_total_output, limits.max_output_per_command
            )));
        }

        if limits.command_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "command_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if limits.max_parallel == 0 {
            return Err(ConfigError::InvalidValue(
                "max_parallel must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
