//! Configuration file parser for ~/.config/feedfold/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are collected rather than rejected and each one is logged as
//! a warning, since they are usually typos.
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::FetchConfig;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but cannot be used.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed URLs fetched when none are given on the command line.
    pub feeds: Vec<String>,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,

    /// Seconds allowed for fetching one feed, body included. Must be non-zero.
    pub timeout_secs: u64,

    /// Largest accepted feed body in bytes. Must be non-zero.
    pub max_feed_bytes: usize,

    /// Keys that match no field above
    #[serde(flatten)]
    unknown: toml::Table,
}

impl Default for Config {
    fn default() -> Self {
        let fetch = FetchConfig::default();
        Self {
            feeds: Vec::new(),
            user_agent: fetch.user_agent,
            timeout_secs: fetch.timeout.as_secs(),
            max_feed_bytes: fetch.max_feed_bytes,
            unknown: toml::Table::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Default location: `$HOME/.config/feedfold/config.toml`.
    ///
    /// Returns `None` when `HOME` is not set.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("feedfold")
                .join("config.toml"),
        )
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → defaults for every key
    /// - Over 1 MB → `Err(ConfigError::TooLarge)`
    /// - Invalid TOML or a wrongly typed value → `Err(ConfigError::Parse)`
    /// - Zero timeout or size limit → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, one warning each
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = read_capped(path, Self::MAX_FILE_SIZE)? else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        };

        let config: Config = toml::from_str(&content)?;
        for key in config.unknown.keys() {
            tracing::warn!(path = %path.display(), key = %key, "Ignoring unknown config key");
        }
        config.validate()?;

        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            timeout_secs = config.timeout_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.max_feed_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_feed_bytes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Transport settings for the HTTP fetcher.
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_feed_bytes: self.max_feed_bytes,
        }
    }
}

/// Reads `path` as UTF-8, refusing anything over `limit` bytes.
///
/// `Ok(None)` when the file does not exist. The size is checked on the bytes
/// actually read, at most `limit + 1` of them.
fn read_capped(path: &Path, limit: u64) -> Result<Option<String>, ConfigError> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::Io(e)),
    };

    let mut bytes = Vec::new();
    file.take(limit + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(ConfigError::TooLarge(format!(
            "{} is over {} bytes",
            path.display(),
            limit
        )));
    }

    String::from_utf8(bytes)
        .map(Some)
        .map_err(|e| ConfigError::Invalid(format!("{} is not UTF-8: {}", path.display(), e)))
}

// ============================================================================
// Tests
// ============================================================================
