//! flowcore Configuration Module
//!
//! Engine-wide defaults for the HTTP requester and the cancel store.
//! Config is stored in `~/.config/flowcore/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`FLOWCORE_*`)
//! 2. Config file (`~/.config/flowcore/config.toml`)
//! 3. Defaults (`util::constants`)

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FlowError, Result};
use crate::util::constants::{
    CANCEL_FLAG_TTL, DEFAULT_RETRY_TIMES, FILE_FETCH_TIMEOUT, HTTP_TIMEOUT, MAX_FORM_DATA_BYTES,
    USER_AGENT,
};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub cancel: CancelSettings,
}

/// HTTP requester defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSettings {
    /// Whole-request timeout when a node sets none
    pub default_timeout_secs: u64,

    /// Remote-file fetch timeout for binary and form-data bodies
    pub file_fetch_timeout_secs: u64,

    /// Cumulative multipart file ceiling
    pub max_form_data_bytes: u64,

    /// Attempts when a node sets none
    pub default_retry_times: u64,

    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            default_timeout_secs: HTTP_TIMEOUT.as_secs(),
            file_fetch_timeout_secs: FILE_FETCH_TIMEOUT.as_secs(),
            max_form_data_bytes: MAX_FORM_DATA_BYTES,
            default_retry_times: DEFAULT_RETRY_TIMES,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl HttpSettings {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn file_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.file_fetch_timeout_secs)
    }
}

/// Cancel store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CancelSettings {
    /// Retention of the durable cancel flag
    pub flag_ttl_secs: u64,
}

impl Default for CancelSettings {
    fn default() -> Self {
        Self {
            flag_ttl_secs: CANCEL_FLAG_TTL.as_secs(),
        }
    }
}

impl CancelSettings {
    pub fn flag_ttl(&self) -> Duration {
        Duration::from_secs(self.flag_ttl_secs)
    }
}

impl EngineConfig {
    /// Returns `~/.config/flowcore/` on Unix, `%APPDATA%/flowcore/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flowcore")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default path
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to read config file: {}", e),
        })?;

        toml::from_str(&content).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    /// Save configuration, creating the directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| FlowError::ConfigError {
                reason: format!("Failed to create config directory: {}", e),
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to write config file: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    /// Unparsable values are ignored with a warning.
    pub fn with_env(mut self) -> Self {
        override_from_env("FLOWCORE_HTTP_TIMEOUT_SECS", &mut self.http.default_timeout_secs);
        override_from_env(
            "FLOWCORE_FILE_FETCH_TIMEOUT_SECS",
            &mut self.http.file_fetch_timeout_secs,
        );
        override_from_env(
            "FLOWCORE_MAX_FORM_DATA_BYTES",
            &mut self.http.max_form_data_bytes,
        );
        override_from_env("FLOWCORE_RETRY_TIMES", &mut self.http.default_retry_times);
        override_from_env("FLOWCORE_CANCEL_FLAG_TTL_SECS", &mut self.cancel.flag_ttl_secs);

        if let Ok(agent) = std::env::var("FLOWCORE_USER_AGENT") {
            if !agent.is_empty() {
                self.http.user_agent = agent;
            }
        }

        self
    }
}

fn override_from_env<T: FromStr>(var: &str, slot: &mut T) {
    let Ok(raw) = std::env::var(var) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => warn!(var, value = %raw, "ignoring unparsable environment override"),
    }
}
