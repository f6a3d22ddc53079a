//! MCP tool-server configuration.
//!
//! Servers are added manually or from presets, validated against the backend
//! (`idle → validating → valid | invalid`), and tool selection is reconciled
//! against whatever the last validation reported:
//!
//! - **Phantom tools**: selected tools a server no longer reports stay
//!   selected but unavailable until a later validation confirms them.
//! - **Stale responses**: every validation is issued a [`ValidationTicket`];
//!   completions for superseded tickets are discarded.
//! - **Presets**: named `(url, tool subset)` templates that create or update
//!   servers, matched by name first and URL second.

pub mod error;
pub mod preset;
pub mod prompt;
pub mod state;

pub use error::{McpError, McpResult};
pub use preset::{preset_from_server, preset_save_plan, PresetSavePlan};
pub use prompt::{NonInteractive, UserPrompt};
pub use state::{
    McpConfiguration, McpPreset, McpServer, McpServerStatus, McpState, McpTool, ToolSelection,
    ValidationApplied, ValidationOutcome, ValidationTicket,
};
