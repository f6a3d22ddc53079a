//! Result exports.
//!
//! Both builders are driven by the declarative field registry in
//! [`fields`]: adding a column means adding one registry entry.
//! - [`csv`] flattens results into rows with dynamic rubric trait columns.
//! - [`json`] emits the versioned `2.0` envelope with the rubric definition
//!   lifted into `shared_data`.

pub mod csv;
pub mod fields;
pub mod json;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

pub use csv::{
    build_csv, collect_trait_names, escape_csv_field, format_csv_value, partition_traits,
    write_csv, TraitPartition, QUESTION_SPECIFIC_COLUMN,
};
pub use fields::{
    extract_field_value, get_all_export_field_keys, get_all_export_fields, get_field_by_key,
    DefaultValue, ExportFieldDefinition, ExportFieldGroup, FieldExtractor, EXPORT_FIELD_GROUPS,
};
pub use json::{
    build_json_export, expand_json_export, write_json_export, ExportMetadata, JsonExport,
    SharedData, JSON_EXPORT_FORMAT_VERSION,
};

/// Errors produced while building an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unknown export field: {0}")]
    UnknownField(String),

    #[error("no export fields selected")]
    EmptySelection,

    #[error("failed to encode export: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write export {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Options shared by the CSV and JSON builders.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Registry keys to export; `None` exports every field.
    pub selected_fields: Option<Vec<String>>,
    /// Verification job the results came from.
    pub job_id: Option<String>,
    pub verification_config: Option<Value>,
    pub job_summary: Option<Value>,
    /// Fixed export timestamp; defaults to now.
    pub export_timestamp: Option<DateTime<Utc>>,
}

impl ExportOptions {
    pub fn with_fields<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_fields = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Resolve the selection against the registry, keeping registry order.
    pub fn resolve_fields(&self) -> Result<Vec<&'static ExportFieldDefinition>, ExportError> {
        let Some(selected) = &self.selected_fields else {
            return Ok(get_all_export_fields());
        };
        if selected.is_empty() {
            return Err(ExportError::EmptySelection);
        }
        if let Some(unknown) = selected.iter().find(|k| get_field_by_key(k).is_none()) {
            return Err(ExportError::UnknownField(unknown.clone()));
        }
        Ok(get_all_export_fields()
            .into_iter()
            .filter(|f| selected.iter().any(|k| k == f.key))
            .collect())
    }
}
