//! Crate-level error taxonomy for Karenina core.

use crate::checkpoint::CheckpointConversionError;
use crate::export::ExportError;
use crate::mcp::McpError;
use crate::model_config::ParameterError;

/// Karenina core errors.
#[derive(Debug, thiserror::Error)]
pub enum KareninaError {
    #[error("invalid results payload: {0}")]
    InvalidResults(String),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointConversionError),

    #[error(transparent)]
    Mcp(#[from] McpError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Karenina core operations.
pub type Result<T> = std::result::Result<T, KareninaError>;
