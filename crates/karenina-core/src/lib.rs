//! Karenina Core Library
//!
//! Domain logic for the Karenina benchmark client: verification result
//! exports, checkpoint interchange, MCP server configuration and model
//! parameter handling. Nothing in this crate performs network I/O.

pub mod checkpoint;
pub mod error;
pub mod export;
pub mod mcp;
pub mod model_config;
pub mod obs;
pub mod result;
pub mod rubric;
pub mod telemetry;

pub use checkpoint::{
    generate_question_id, jsonld_to_v2, parse_jsonld_checkpoint, read_checkpoint_file,
    v2_to_jsonld, validate_jsonld_checkpoint, write_jsonld_checkpoint, write_unified_checkpoint,
    CheckpointConversionError, CheckpointFormat, CheckpointItem, JsonLdCheckpoint,
    UnifiedCheckpoint,
};

pub use error::{KareninaError, Result};

pub use export::{
    build_csv, build_json_export, escape_csv_field, extract_field_value,
    get_all_export_field_keys, get_all_export_fields, get_field_by_key, write_csv,
    write_json_export, ExportError, ExportFieldDefinition, ExportOptions, JsonExport,
};

pub use mcp::{
    preset_save_plan, McpConfiguration, McpError, McpPreset, McpServer, McpServerStatus, McpState,
    McpTool, PresetSavePlan, UserPrompt, ValidationApplied, ValidationOutcome, ValidationTicket,
};

pub use model_config::{merge_model_parameters, ModelConfiguration, ParameterError};

pub use result::{load_results, parse_results, ExportableResult};

pub use rubric::{
    CallableTrait, LlmRubricTrait, MetricEvaluationMode, MetricRubricTrait, RegexTrait, Rubric,
    TraitKind,
};

pub use telemetry::init_tracing;

/// Version stamped into exports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
