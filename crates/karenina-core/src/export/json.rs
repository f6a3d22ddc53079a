//! Versioned JSON export builder.
//!
//! The rubric definition is identical across every result in one export, so
//! it is lifted out of each result into `shared_data.rubric_definition`.
//! [`expand_json_export`] puts it back; the two forms are semantically
//! equivalent.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fields::resolve_path;
use super::{ExportError, ExportOptions};
use crate::obs;
use crate::result::ExportableResult;
use crate::rubric::Rubric;

pub const JSON_EXPORT_FORMAT_VERSION: &str = "2.0";

/// Export envelope metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportMetadata {
    pub export_timestamp: DateTime<Utc>,
    pub karenina_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub total_results: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_summary: Option<Value>,
}

/// Data shared by every result in the export.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SharedData {
    pub rubric_definition: Option<Value>,
}

/// The `2.0` JSON export document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonExport {
    pub format_version: String,
    pub metadata: ExportMetadata,
    pub shared_data: SharedData,
    pub results: Vec<Value>,
}

/// Copy `value` into `out` at the dot `path`, creating objects as needed.
fn insert_path(out: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = out;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
}

fn export_result(
    result: &ExportableResult,
    selected_paths: Option<&[&str]>,
) -> Result<Value, ExportError> {
    let mut json = serde_json::to_value(result)?;

    if let Some(rubric) = json.get_mut("rubric").and_then(Value::as_object_mut) {
        rubric.remove("evaluation_rubric");
    }
    if let Some(metadata) = json.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.insert(
            "completed_without_errors".to_string(),
            result.export_completion_status(),
        );
    }

    let Some(paths) = selected_paths else {
        return Ok(json);
    };
    let mut selected = Map::new();
    for path in paths {
        if let Some(value) = resolve_path(&json, path) {
            insert_path(&mut selected, path, value.clone());
        }
    }
    Ok(Value::Object(selected))
}

/// Build the `2.0` JSON export document.
pub fn build_json_export(
    results: &[ExportableResult],
    global_rubric: Option<&Rubric>,
    options: &ExportOptions,
) -> Result<JsonExport, ExportError> {
    let paths: Vec<&str> = options
        .resolve_fields()?
        .into_iter()
        .filter(|f| f.has_path())
        .map(|f| f.path)
        .collect();
    let columns = paths.len();
    let selected_paths = options.selected_fields.as_ref().map(|_| paths);

    let rubric_definition = match results
        .iter()
        .find_map(|r| r.rubric.as_ref().and_then(|rb| rb.evaluation_rubric.clone()))
    {
        Some(definition) => Some(definition),
        None => global_rubric.map(serde_json::to_value).transpose()?,
    };

    let exported = results
        .iter()
        .map(|r| export_result(r, selected_paths.as_deref()))
        .collect::<Result<Vec<_>, _>>()?;

    let doc = JsonExport {
        format_version: JSON_EXPORT_FORMAT_VERSION.to_string(),
        metadata: ExportMetadata {
            export_timestamp: options.export_timestamp.unwrap_or_else(Utc::now),
            karenina_version: crate::VERSION.to_string(),
            job_id: options.job_id.clone(),
            total_results: exported.len(),
            verification_config: options.verification_config.clone(),
            job_summary: options.job_summary.clone(),
        },
        shared_data: SharedData { rubric_definition },
        results: exported,
    };

    obs::emit_export_built("json", doc.metadata.total_results, columns);
    Ok(doc)
}

/// Re-attach the shared rubric definition to every result carrying a rubric.
pub fn expand_json_export(doc: &JsonExport) -> Vec<Value> {
    let mut results = doc.results.clone();
    if let Some(definition) = &doc.shared_data.rubric_definition {
        for result in &mut results {
            if let Some(rubric) = result.get_mut("rubric").and_then(Value::as_object_mut) {
                rubric.insert("evaluation_rubric".to_string(), definition.clone());
            }
        }
    }
    results
}

/// Write the export as pretty JSON.
pub fn write_json_export(path: &Path, doc: &JsonExport) -> Result<(), ExportError> {
    let content = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, content).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })
}
