//! Runtime configuration with layered resolution.
//!
//! Resolution order (highest priority first):
//! 1. Explicit overrides (CLI flags)
//! 2. Environment variables (`LAPAK_*`)
//! 3. Config file (`lapak.toml`)
//! 4. Compiled defaults
//!
//! Unknown keys in the file are ignored.

use crate::logging::{default_log_level, parse_level};
use crate::model::org::Plan;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "lapak.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse { path: String, message: String },
    InvalidEnv { key: String, value: String },
    Invalid { field: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "cannot read config `{path}`: {message}"),
            Self::Parse { path, message } => write!(f, "invalid TOML in `{path}`: {message}"),
            Self::InvalidEnv { key, value } => write!(f, "invalid value `{value}` for {key}"),
            Self::Invalid { field, message } => write!(f, "config {field} {message}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("lapak.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// File logging is off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RfmConfig {
    pub lookback_days: u32,
}

impl Default for RfmConfig {
    fn default() -> Self {
        Self { lookback_days: 365 }
    }
}

/// Monthly assistant limits of one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    pub max_requests: u64,
    pub max_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub free_requests: u64,
    pub free_tokens: u64,
    pub pro_requests: u64,
    pub pro_tokens: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_requests: 50,
            free_tokens: 100_000,
            pro_requests: 1_000,
            pro_tokens: 2_000_000,
        }
    }
}

impl QuotaConfig {
    pub fn limits_for(&self, plan: Plan) -> QuotaLimits {
        match plan {
            Plan::Free => QuotaLimits {
                max_requests: self.free_requests,
                max_tokens: self.free_tokens,
            },
            Plan::Pro => QuotaLimits {
                max_requests: self.pro_requests,
                max_tokens: self.pro_tokens,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub top_products: u32,
    pub low_stock_threshold: i64,
    pub max_question_chars: usize,
    pub context_days: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            top_products: 5,
            low_stock_threshold: 5,
            max_question_chars: 1_000,
            context_days: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LapakConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub rfm: RfmConfig,
    pub quota: QuotaConfig,
    pub assistant: AssistantConfig,
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl LapakConfig {
    /// Resolves the full configuration from the process environment.
    ///
    /// A missing `config_path` is an error only when the caller named it
    /// explicitly; otherwise `lapak.toml` in the working directory is
    /// optional.
    pub fn load(
        config_path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, "<string>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse {
            path: origin.to_string(),
            message: err.to_string(),
        })
    }

    /// Applies `LAPAK_*` variables read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("LAPAK_DB_PATH") {
            self.database.path = PathBuf::from(value);
        }
        if let Some(value) = lookup("LAPAK_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = lookup("LAPAK_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(value));
        }
        if let Some(value) = env_number(&lookup, "LAPAK_RFM_LOOKBACK_DAYS")? {
            self.rfm.lookback_days = value;
        }
        if let Some(value) = env_number(&lookup, "LAPAK_QUOTA_FREE_REQUESTS")? {
            self.quota.free_requests = value;
        }
        if let Some(value) = env_number(&lookup, "LAPAK_QUOTA_FREE_TOKENS")? {
            self.quota.free_tokens = value;
        }
        if let Some(value) = env_number(&lookup, "LAPAK_QUOTA_PRO_REQUESTS")? {
            self.quota.pro_requests = value;
        }
        if let Some(value) = env_number(&lookup, "LAPAK_QUOTA_PRO_TOKENS")? {
            self.quota.pro_tokens = value;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(path) = &overrides.db_path {
            self.database.path = path.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(dir) = &overrides.log_dir {
            self.logging.dir = Some(dir.clone());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if parse_level(&self.logging.level).is_err() {
            return Err(ConfigError::Invalid {
                field: "logging.level",
                message: format!("`{}` is not a supported level", self.logging.level),
            });
        }
        if self.rfm.lookback_days == 0 {
            return Err(ConfigError::Invalid {
                field: "rfm.lookback_days",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.quota.free_requests == 0 || self.quota.pro_requests == 0 {
            return Err(ConfigError::Invalid {
                field: "quota",
                message: "request limits must be greater than 0".to_string(),
            });
        }
        if self.assistant.max_question_chars == 0 {
            return Err(ConfigError::Invalid {
                field: "assistant.max_question_chars",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.assistant.context_days == 0 {
            return Err(ConfigError::Invalid {
                field: "assistant.context_days",
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value,
            }),
    }
}
