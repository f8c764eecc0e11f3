//! Downloader configuration loading and validation.
//!
//! Configuration can come from a JSON document (missing keys take defaults)
//! and is then optionally overlaid with `DOWNLOADER_*` environment variables.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::download::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_FILENAME_MAX_LENGTH, DEFAULT_MAX_REDIRECTS, READ_TIMEOUT_SECS,
};
use crate::environment::Environment;

/// Upper bound for either timeout, in seconds.
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Upper bound for `max_redirects`.
const MAX_REDIRECTS_LIMIT: usize = 50;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("invalid downloader config: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment variable held an unparsable value.
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// A value is outside its allowed range.
    #[error("invalid config value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: u64,
        /// Human-readable allowed range.
        expected: &'static str,
    },
}

/// Settings shared by every download made through one [`Downloader`](crate::download::Downloader).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloaderConfig {
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds (headers and body), unless a call overrides it.
    pub read_timeout_secs: u64,
    /// Maximum number of redirect hops followed per download.
    pub max_redirects: usize,
    /// Default maximum filename length, in characters.
    pub filename_max_length: usize,
    /// Overrides the platform User-Agent.
    pub user_agent: Option<String>,
    /// Controls whether diagnostics are surfaced.
    pub environment: Environment,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            filename_max_length: DEFAULT_FILENAME_MAX_LENGTH,
            user_agent: None,
            environment: Environment::current(),
        }
    }
}

impl DownloaderConfig {
    /// Parses a JSON document; absent keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown keys, and
    /// any validation error from [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `DOWNLOADER_CONNECT_TIMEOUT_SECS`, `DOWNLOADER_READ_TIMEOUT_SECS`,
    /// `DOWNLOADER_MAX_REDIRECTS`, `DOWNLOADER_FILENAME_MAX_LENGTH` and
    /// `DOWNLOADER_USER_AGENT` on top of this config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a numeric variable does not parse.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "DOWNLOADER_CONNECT_TIMEOUT_SECS")? {
            self.connect_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "DOWNLOADER_READ_TIMEOUT_SECS")? {
            self.read_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "DOWNLOADER_MAX_REDIRECTS")? {
            self.max_redirects = v;
        }
        if let Some(v) = parse_var(&lookup, "DOWNLOADER_FILENAME_MAX_LENGTH")? {
            self.filename_max_length = v;
        }
        if let Some(ua) = lookup("DOWNLOADER_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            self.user_agent = Some(ua);
        }
        Ok(self)
    }

    /// Validates value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;

        if self.max_redirects > MAX_REDIRECTS_LIMIT {
            return Err(ConfigError::OutOfRange {
                field: "max_redirects",
                value: self.max_redirects as u64,
                expected: "0..=50",
            });
        }
        if self.filename_max_length == 0 {
            return Err(ConfigError::OutOfRange {
                field: "filename_max_length",
                value: 0,
                expected: ">= 1",
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if (1..=MAX_TIMEOUT_SECS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "1..=3600",
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value: raw }),
    }
}
