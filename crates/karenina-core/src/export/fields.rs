//! Export field registry.
//!
//! Each [`ExportFieldDefinition`] maps one flat output column to a dot path
//! inside the JSON form of an [`ExportableResult`]. The grouped registry
//! [`EXPORT_FIELD_GROUPS`] is the single source of truth for CSV headers and
//! for JSON field selection.
//!
//! # Invariants
//!
//! Every `key` is unique across the registry. Fields without a `path` are
//! computed by their `extractor` and have no JSON counterpart.

use serde_json::Value;

use super::ExportError;
use crate::result::ExportableResult;

/// Value used when a field's path does not resolve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl DefaultValue {
    pub fn to_value(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::from(i),
            Self::Str(s) => Value::String(s.to_string()),
        }
    }
}

/// Computes a field value from the result and its zero-based row index.
pub type FieldExtractor = fn(&ExportableResult, usize) -> Value;

/// Declarative descriptor of one flat export column.
#[derive(Debug, Clone, Copy)]
pub struct ExportFieldDefinition {
    pub key: &'static str,
    /// Dot path into the result; empty for computed-only fields.
    pub path: &'static str,
    /// Render non-null values as compact JSON in CSV output.
    pub is_json: bool,
    pub default_value: DefaultValue,
    pub extractor: Option<FieldExtractor>,
}

impl ExportFieldDefinition {
    const fn plain(key: &'static str, path: &'static str) -> Self {
        Self {
            key,
            path,
            is_json: false,
            default_value: DefaultValue::Null,
            extractor: None,
        }
    }

    const fn json(key: &'static str, path: &'static str) -> Self {
        Self {
            is_json: true,
            ..Self::plain(key, path)
        }
    }

    const fn flag(key: &'static str, path: &'static str) -> Self {
        Self {
            default_value: DefaultValue::Bool(false),
            ..Self::plain(key, path)
        }
    }

    const fn computed(key: &'static str, path: &'static str, extractor: FieldExtractor) -> Self {
        Self {
            extractor: Some(extractor),
            ..Self::plain(key, path)
        }
    }

    const fn or(self, default_value: DefaultValue) -> Self {
        Self {
            default_value,
            ..self
        }
    }

    /// True when the field has a location in the nested result.
    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Named group of fields, in output order.
#[derive(Debug, Clone, Copy)]
pub struct ExportFieldGroup {
    pub name: &'static str,
    pub fields: &'static [ExportFieldDefinition],
}

type F = ExportFieldDefinition;

fn row_index(_: &ExportableResult, index: usize) -> Value {
    Value::from(index + 1)
}

fn completed_without_errors(result: &ExportableResult, _: usize) -> Value {
    result.export_completion_status()
}

/// `passed/total` over boolean LLM, regex and callable trait scores.
fn rubric_summary(result: &ExportableResult, _: usize) -> Value {
    let Some(rubric) = &result.rubric else {
        return Value::String(String::new());
    };
    let booleans: Vec<bool> = [
        &rubric.llm_trait_scores,
        &rubric.regex_trait_scores,
        &rubric.callable_trait_scores,
    ]
    .into_iter()
    .flatten()
    .flat_map(|scores| scores.values())
    .filter_map(Value::as_bool)
    .collect();

    if booleans.is_empty() {
        return Value::String(String::new());
    }
    let passed = booleans.iter().filter(|b| **b).count();
    Value::String(format!("{}/{}", passed, booleans.len()))
}

const METADATA_FIELDS: &[F] = &[
    F::computed("row_index", "", row_index),
    F::plain("question_id", "metadata.question_id").or(DefaultValue::Str("")),
    F::plain("question_text", "metadata.question_text"),
    F::plain("raw_answer", "metadata.raw_answer"),
    F::json("keywords", "metadata.keywords"),
    F::plain("template_id", "metadata.template_id"),
    F::plain("answering_model", "metadata.answering_model").or(DefaultValue::Str("")),
    F::plain("parsing_model", "metadata.parsing_model").or(DefaultValue::Str("")),
    F::plain("replicate", "metadata.replicate"),
    F::computed(
        "completed_without_errors",
        "metadata.completed_without_errors",
        completed_without_errors,
    )
    .or(DefaultValue::Bool(false)),
    F::plain("error", "metadata.error"),
    F::plain("execution_time", "metadata.execution_time"),
    F::plain("timestamp", "metadata.timestamp"),
    F::plain("run_name", "metadata.run_name"),
    F::plain("job_id", "metadata.job_id"),
    F::plain("result_id", "metadata.result_id"),
];

const PROMPT_FIELDS: &[F] = &[
    F::plain("answering_system_prompt", "metadata.answering_system_prompt"),
    F::plain("parsing_system_prompt", "metadata.parsing_system_prompt"),
];

const TEMPLATE_FIELDS: &[F] = &[
    F::plain("raw_llm_response", "template.raw_llm_response").or(DefaultValue::Str("")),
    F::json("parsed_gt_response", "template.parsed_gt_response"),
    F::json("parsed_llm_response", "template.parsed_llm_response"),
    F::flag(
        "template_verification_performed",
        "template.template_verification_performed",
    ),
    F::json("verify_result", "template.verify_result"),
    F::json("verify_granular_result", "template.verify_granular_result"),
];

const EMBEDDING_FIELDS: &[F] = &[
    F::flag(
        "embedding_check_performed",
        "template.embedding_check_performed",
    ),
    F::plain(
        "embedding_similarity_score",
        "template.embedding_similarity_score",
    ),
    F::flag(
        "embedding_override_applied",
        "template.embedding_override_applied",
    ),
    F::plain("embedding_model_used", "template.embedding_model_used"),
];

const REGEX_FIELDS: &[F] = &[
    F::flag(
        "regex_validations_performed",
        "template.regex_validations_performed",
    ),
    F::json(
        "regex_validation_results",
        "template.regex_validation_results",
    ),
    F::plain("regex_overall_success", "template.regex_overall_success"),
];

const ABSTENTION_FIELDS: &[F] = &[
    F::flag(
        "abstention_check_performed",
        "template.abstention_check_performed",
    ),
    F::flag("abstention_detected", "template.abstention_detected"),
    F::flag(
        "abstention_override_applied",
        "template.abstention_override_applied",
    ),
    F::plain("abstention_reasoning", "template.abstention_reasoning"),
];

const AGENT_FIELDS: &[F] = &[
    F::flag("recursion_limit_reached", "template.recursion_limit_reached"),
    F::json("answering_mcp_servers", "template.answering_mcp_servers"),
    F::json("usage_metadata", "template.usage_metadata"),
    F::json("agent_metrics", "template.agent_metrics"),
];

const RUBRIC_FIELDS: &[F] = &[
    F::flag(
        "rubric_evaluation_performed",
        "rubric.rubric_evaluation_performed",
    ),
    F::plain(
        "rubric_evaluation_strategy",
        "rubric.rubric_evaluation_strategy",
    ),
    F::computed("rubric_summary", "", rubric_summary),
    F::json(
        "metric_trait_confusion_lists",
        "rubric.metric_trait_confusion_lists",
    ),
];

const DEEP_JUDGMENT_FIELDS: &[F] = &[
    F::flag("deep_judgment_enabled", "deep_judgment.deep_judgment_enabled"),
    F::flag(
        "deep_judgment_performed",
        "deep_judgment.deep_judgment_performed",
    ),
    F::json("extracted_excerpts", "deep_judgment.extracted_excerpts"),
    F::json("attribute_reasoning", "deep_judgment.attribute_reasoning"),
    F::json(
        "deep_judgment_stages_completed",
        "deep_judgment.deep_judgment_stages_completed",
    ),
    F::plain(
        "deep_judgment_model_calls",
        "deep_judgment.deep_judgment_model_calls",
    )
    .or(DefaultValue::Int(0)),
    F::plain(
        "deep_judgment_excerpt_retry_count",
        "deep_judgment.deep_judgment_excerpt_retry_count",
    )
    .or(DefaultValue::Int(0)),
    F::json(
        "attributes_without_excerpts",
        "deep_judgment.attributes_without_excerpts",
    ),
    F::flag(
        "deep_judgment_search_enabled",
        "deep_judgment.deep_judgment_search_enabled",
    ),
    F::json(
        "hallucination_risk_assessment",
        "deep_judgment.hallucination_risk_assessment",
    ),
];

const DEEP_JUDGMENT_RUBRIC_FIELDS: &[F] = &[
    F::flag(
        "deep_judgment_rubric_performed",
        "deep_judgment_rubric.deep_judgment_rubric_performed",
    ),
    F::json(
        "extracted_rubric_excerpts",
        "deep_judgment_rubric.extracted_rubric_excerpts",
    ),
    F::json(
        "rubric_trait_reasoning",
        "deep_judgment_rubric.rubric_trait_reasoning",
    ),
    F::json(
        "deep_judgment_rubric_scores",
        "deep_judgment_rubric.deep_judgment_rubric_scores",
    ),
    F::json(
        "standard_rubric_scores",
        "deep_judgment_rubric.standard_rubric_scores",
    ),
    F::json(
        "traits_without_valid_excerpts",
        "deep_judgment_rubric.traits_without_valid_excerpts",
    ),
    F::json(
        "rubric_hallucination_risk",
        "deep_judgment_rubric.rubric_hallucination_risk",
    ),
    F::plain(
        "total_deep_judgment_model_calls",
        "deep_judgment_rubric.total_deep_judgment_model_calls",
    )
    .or(DefaultValue::Int(0)),
    F::plain(
        "total_traits_evaluated",
        "deep_judgment_rubric.total_traits_evaluated",
    )
    .or(DefaultValue::Int(0)),
    F::plain(
        "total_excerpt_retries",
        "deep_judgment_rubric.total_excerpt_retries",
    )
    .or(DefaultValue::Int(0)),
];

/// Grouped field registry, in output order.
pub static EXPORT_FIELD_GROUPS: &[ExportFieldGroup] = &[
    ExportFieldGroup {
        name: "metadata",
        fields: METADATA_FIELDS,
    },
    ExportFieldGroup {
        name: "prompts",
        fields: PROMPT_FIELDS,
    },
    ExportFieldGroup {
        name: "template",
        fields: TEMPLATE_FIELDS,
    },
    ExportFieldGroup {
        name: "embedding",
        fields: EMBEDDING_FIELDS,
    },
    ExportFieldGroup {
        name: "regex",
        fields: REGEX_FIELDS,
    },
    ExportFieldGroup {
        name: "abstention",
        fields: ABSTENTION_FIELDS,
    },
    ExportFieldGroup {
        name: "agent",
        fields: AGENT_FIELDS,
    },
    ExportFieldGroup {
        name: "rubric",
        fields: RUBRIC_FIELDS,
    },
    ExportFieldGroup {
        name: "deep_judgment",
        fields: DEEP_JUDGMENT_FIELDS,
    },
    ExportFieldGroup {
        name: "deep_judgment_rubric",
        fields: DEEP_JUDGMENT_RUBRIC_FIELDS,
    },
];

/// Flatten the grouped registry into one ordered list.
pub fn get_all_export_fields() -> Vec<&'static ExportFieldDefinition> {
    EXPORT_FIELD_GROUPS
        .iter()
        .flat_map(|group| group.fields.iter())
        .collect()
}

pub fn get_all_export_field_keys() -> Vec<&'static str> {
    get_all_export_fields().iter().map(|f| f.key).collect()
}

pub fn get_field_by_key(key: &str) -> Option<&'static ExportFieldDefinition> {
    EXPORT_FIELD_GROUPS
        .iter()
        .flat_map(|group| group.fields.iter())
        .find(|f| f.key == key)
}

/// Resolve a dot path; `None` when a segment is missing or the leaf is null.
pub(crate) fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
        .filter(|v| !v.is_null())
}

/// Like [`extract_field_value`], with the result's JSON form precomputed.
pub(crate) fn extract_from_value(
    result: &ExportableResult,
    json: &Value,
    field: &ExportFieldDefinition,
    index: usize,
) -> Value {
    if let Some(extractor) = field.extractor {
        return extractor(result, index);
    }
    resolve_path(json, field.path)
        .cloned()
        .unwrap_or_else(|| field.default_value.to_value())
}

/// Value of `field` for `result` at zero-based row `index`.
pub fn extract_field_value(
    result: &ExportableResult,
    field: &ExportFieldDefinition,
    index: usize,
) -> Result<Value, ExportError> {
    let json = serde_json::to_value(result)?;
    Ok(extract_from_value(result, &json, field, index))
}
