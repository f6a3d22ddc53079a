//! Error types for karenina-client

use std::path::PathBuf;

use karenina_core::{CheckpointConversionError, McpError};
use thiserror::Error;

/// Errors from loading client configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for `ClientConfig`
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// An environment variable or flag holds an unusable value
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Errors that can occur when talking to the backend
#[derive(Error, Debug)]
pub enum ClientError {
    /// Backend answered with a non-2xx status
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Connection, timeout or other transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body did not match the expected shape
    #[error("malformed response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// Invalid client configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// MCP configuration action rejected
    #[error(transparent)]
    Mcp(#[from] McpError),

    /// Backend returned a checkpoint that does not convert
    #[error(transparent)]
    Checkpoint(#[from] CheckpointConversionError),

    /// Request body could not be encoded
    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode {
                endpoint: err
                    .url()
                    .map(|u| u.path().to_string())
                    .unwrap_or_default(),
                message: err.to_string(),
            }
        } else {
            ClientError::Http(err.to_string())
        }
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
