//! Error types for MCP server configuration.

/// Errors produced by MCP configuration actions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum McpError {
    #[error("server name must not be empty")]
    EmptyName,

    #[error("invalid server url `{url}`: must start with http:// or https://")]
    InvalidUrl { url: String },

    #[error("server already exists: {0}")]
    DuplicateServer(String),

    #[error("server not found: {0}")]
    UnknownServer(String),

    #[error("server {server} does not report tool `{tool}`")]
    UnknownTool { server: String, tool: String },

    #[error("preset name must not be empty")]
    EmptyPresetName,

    #[error("preset not found: {0}")]
    UnknownPreset(String),
}

/// Result type for MCP operations.
pub type McpResult<T> = std::result::Result<T, McpError>;
