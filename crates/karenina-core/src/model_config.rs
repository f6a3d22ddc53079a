//! Model configuration and parameter merging.
//!
//! Model parameters can be set through structured fields or as raw JSON
//! text. A key set in both places is a conflict the user must resolve;
//! neither value wins silently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mcp::McpConfiguration;

/// Errors from merging structured and raw model parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    #[error("parameters set both in fields and raw JSON: {}", .keys.join(", "))]
    Conflict { keys: Vec<String> },

    #[error("raw parameters must be a JSON object: {0}")]
    InvalidRaw(String),
}

/// One answering or parsing model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfiguration {
    pub id: String,
    pub model_provider: String,
    pub model_name: String,
    /// Backend adapter, e.g. `langchain`, `openrouter`, `openai_endpoint`, `manual`.
    pub interface: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra_kwargs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_urls_dict: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_tool_filter: Option<Vec<String>>,
}

impl ModelConfiguration {
    pub fn new(id: &str, provider: &str, model: &str, interface: &str) -> Self {
        Self {
            id: id.to_string(),
            model_provider: provider.to_string(),
            model_name: model.to_string(),
            interface: interface.to_string(),
            temperature: None,
            max_tokens: None,
            system_prompt: None,
            extra_kwargs: Map::new(),
            mcp_urls_dict: None,
            mcp_tool_filter: None,
        }
    }

    /// Attach an MCP configuration; an empty one clears the fields.
    pub fn with_mcp(mut self, mcp: &McpConfiguration) -> Self {
        if mcp.is_empty() {
            self.mcp_urls_dict = None;
            self.mcp_tool_filter = None;
        } else {
            self.mcp_urls_dict = Some(mcp.servers.clone());
            self.mcp_tool_filter = Some(mcp.tools.clone());
        }
        self
    }

    /// Parameters set through structured fields.
    fn structured_kwargs(&self) -> Map<String, Value> {
        let mut kwargs = Map::new();
        if let Some(t) = self.temperature {
            kwargs.insert("temperature".to_string(), Value::from(t));
        }
        if let Some(m) = self.max_tokens {
            kwargs.insert("max_tokens".to_string(), Value::from(m));
        }
        if let Some(p) = &self.system_prompt {
            kwargs.insert("system_prompt".to_string(), Value::from(p.as_str()));
        }
        for (k, v) in &self.extra_kwargs {
            kwargs.insert(k.clone(), v.clone());
        }
        kwargs
    }
}

/// Merge structured fields with raw JSON editor text.
///
/// Blank raw text counts as `{}`. Every key present on both sides is
/// reported, sorted.
pub fn merge_model_parameters(
    config: &ModelConfiguration,
    raw_json: &str,
) -> Result<Map<String, Value>, ParameterError> {
    let mut merged = config.structured_kwargs();
    if raw_json.trim().is_empty() {
        return Ok(merged);
    }

    let raw: Value =
        serde_json::from_str(raw_json).map_err(|e| ParameterError::InvalidRaw(e.to_string()))?;
    let Value::Object(raw) = raw else {
        return Err(ParameterError::InvalidRaw(format!(
            "found {}",
            crate::result::json_type_name(&raw)
        )));
    };

    let mut keys: Vec<String> = raw
        .keys()
        .filter(|k| merged.contains_key(k.as_str()))
        .cloned()
        .collect();
    if !keys.is_empty() {
        keys.sort();
        return Err(ParameterError::Conflict { keys });
    }

    merged.extend(raw);
    Ok(merged)
}
