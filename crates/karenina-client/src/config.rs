//! Client configuration.
//!
//! Precedence, lowest first: built-in defaults, TOML file, environment
//! variables, explicit overrides (CLI flags).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_API_URL: &str = "KARENINA_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "KARENINA_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL_MS: &str = "KARENINA_POLL_INTERVAL_MS";
pub const ENV_MCP_PRESETS_ENABLED: &str = "KARENINA_MCP_PRESETS_ENABLED";

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Backend client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the backend server
    pub api_url: String,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// Delay between job progress polls
    pub poll_interval_ms: u64,
    /// Whether MCP presets are fetched from the backend
    pub mcp_presets_enabled: bool,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 30,
            poll_interval_ms: 1000,
            mcp_presets_enabled: true,
            user_agent: format!("karenina-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

impl ClientConfig {
    /// Create config for a specific server
    pub fn new(api_url: &str) -> Self {
        ClientConfig {
            api_url: api_url.to_string(),
            ..Self::default()
        }
    }

    /// Read a TOML config file. Missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the optional file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        config.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `KARENINA_*` overrides read through `lookup`.
    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = parse_value(ENV_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_value(ENV_POLL_INTERVAL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_MCP_PRESETS_ENABLED) {
            self.mcp_presets_enabled = parse_flag(ENV_MCP_PRESETS_ENABLED, &v)?;
        }
        Ok(self)
    }

    /// Override the API URL (e.g. from a CLI flag).
    pub fn with_api_url(mut self, api_url: Option<&str>) -> Self {
        if let Some(url) = api_url {
            self.api_url = url.to_string();
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
