//! Application configuration loaded from a JSON file.
//!
//! # Invariants
//! - Every field has a default, so a partial file is valid.
//! - Relative paths resolve against the configuration file's directory.

use crate::logging::default_log_level;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "perfectial.json";
pub const DEFAULT_DATABASE_FILE: &str = "perfectial.sqlite3";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config `{path}`: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config `{path}`: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum DatabaseConfig {
    Sqlite {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        busy_timeout_ms: Option<u64>,
    },
    Memory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        busy_timeout_ms: Option<u64>,
    },
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from(DEFAULT_DATABASE_FILE),
            busy_timeout_ms: None,
        }
    }
}

impl DatabaseConfig {
    pub fn memory() -> Self {
        Self::Memory {
            busy_timeout_ms: None,
        }
    }

    /// Database file path, or `None` for an in-memory database.
    pub fn resolve_path(&self, base_dir: &Path) -> Option<PathBuf> {
        match self {
            Self::Sqlite { path, .. } if path.is_absolute() => Some(path.clone()),
            Self::Sqlite { path, .. } => Some(base_dir.join(path)),
            Self::Memory { .. } => None,
        }
    }

    pub fn busy_timeout_ms(&self) -> Option<u64> {
        match self {
            Self::Sqlite {
                busy_timeout_ms, ..
            }
            | Self::Memory { busy_timeout_ms } => *busy_timeout_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
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

impl AppConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, writing a default configuration there first when absent.
    pub fn load_or_init(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        config.save(path)?;
        info!(
            "event=config_init module=config status=ok path={}",
            path.display()
        );
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
