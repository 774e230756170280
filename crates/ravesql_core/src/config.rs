//! Repository configuration.
//!
//! # Responsibility
//! - Describe where SQL resources live and which ones load eagerly.
//! - Carry the logging settings hosts pass to `init_logging`.
//!
//! # Invariants
//! - Missing or blank environment values fall back to defaults.

use crate::logging::{default_log_level, init_logging};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_SQL_ROOT: &str = "RAVESQL_SQL_ROOT";
pub const ENV_PRELOAD: &str = "RAVESQL_PRELOAD";
pub const ENV_LOG_LEVEL: &str = "RAVESQL_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "RAVESQL_LOG_DIR";

const DEFAULT_SQL_ROOT: &str = "sql";

/// Settings for building a `SqlRepository` over a directory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Directory logical SQL paths are resolved against.
    pub sql_root: PathBuf,
    /// Paths loaded into the cache at construction time.
    pub preload: Vec<String>,
    pub log_level: String,
    /// Absolute log directory; logging stays off when `None`.
    pub log_dir: Option<PathBuf>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            sql_root: PathBuf::from(DEFAULT_SQL_ROOT),
            preload: Vec::new(),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl RepositoryConfig {
    /// Reads `RAVESQL_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(root) = read(ENV_SQL_ROOT) {
            config.sql_root = PathBuf::from(root);
        }
        if let Some(preload) = read(ENV_PRELOAD) {
            config.preload = split_list(&preload);
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        config.log_dir = read(ENV_LOG_DIR).map(PathBuf::from);
        config
    }

    /// Starts file logging when `log_dir` is set.
    pub fn init_logging(&self) -> Result<(), String> {
        let Some(log_dir) = &self.log_dir else {
            return Ok(());
        };
        let log_dir = log_dir
            .to_str()
            .ok_or_else(|| format!("log_dir is not valid UTF-8: {}", log_dir.display()))?;
        init_logging(&self.log_level, log_dir)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
