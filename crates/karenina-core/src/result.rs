//! Verification result schema as received from the backend.
//!
//! An [`ExportableResult`] describes one verification outcome for a
//! (question, model, replicate) triple. Results are deserialized through
//! these typed records so a malformed backend payload fails at the boundary.
//! Fields the client does not know about are kept in the `extra` maps and
//! survive a JSON export untouched.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{KareninaError, Result};

/// Map of trait name to evaluated score (bool, integer, or metric object).
pub type TraitScores = BTreeMap<String, Value>;

/// Identity and tracking metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultMetadata {
    pub question_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default)]
    pub completed_without_errors: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub answering_model: String,
    #[serde(default)]
    pub parsing_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answering_system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsing_system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// LLM response and template verification outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_llm_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_gt_response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_llm_response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_verification_performed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_granular_result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_check_performed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_similarity_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_override_applied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_validations_performed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_validation_results: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_overall_success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursion_limit_reached: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answering_mcp_servers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstention_check_performed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstention_detected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstention_override_applied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstention_reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_metrics: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Rubric trait scores split by evaluator kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultRubric {
    #[serde(default)]
    pub rubric_evaluation_performed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_evaluation_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_trait_scores: Option<TraitScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_trait_scores: Option<TraitScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callable_trait_scores: Option<TraitScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_trait_scores: Option<TraitScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_trait_confusion_lists: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_rubric: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultRubric {
    /// Iterate every trait score across the four evaluator kinds.
    pub fn all_scores(&self) -> impl Iterator<Item = (&String, &Value)> {
        [
            &self.llm_trait_scores,
            &self.regex_trait_scores,
            &self.callable_trait_scores,
            &self.metric_trait_scores,
        ]
        .into_iter()
        .flatten()
        .flat_map(|scores| scores.iter())
    }

    /// Look up a trait score by name in any evaluator kind.
    pub fn score(&self, name: &str) -> Option<&Value> {
        self.all_scores().find(|(n, _)| n.as_str() == name).map(|(_, v)| v)
    }
}

/// Excerpt-based multi-stage parsing results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultDeepJudgment {
    #[serde(default)]
    pub deep_judgment_enabled: bool,
    #[serde(default)]
    pub deep_judgment_performed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_excerpts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_reasoning: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_stages_completed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_model_calls: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_excerpt_retry_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes_without_excerpts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_search_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hallucination_risk_assessment: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Excerpt-based rubric scoring results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultDeepJudgmentRubric {
    #[serde(default)]
    pub deep_judgment_rubric_performed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_rubric_excerpts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_trait_reasoning: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_rubric_scores: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_rubric_scores: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits_without_valid_excerpts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_hallucination_risk: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_deep_judgment_model_calls: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_traits_evaluated: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_excerpt_retries: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One verification outcome for a (question, model, replicate) triple.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExportableResult {
    pub metadata: ResultMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<ResultTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric: Option<ResultRubric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment: Option<ResultDeepJudgment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_rubric: Option<ResultDeepJudgmentRubric>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Key that identifies a result within one export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultIdentity {
    pub question_id: String,
    pub answering_model: String,
    pub parsing_model: String,
    pub replicate: Option<u32>,
}

impl ExportableResult {
    pub fn identity(&self) -> ResultIdentity {
        ResultIdentity {
            question_id: self.metadata.question_id.clone(),
            answering_model: self.metadata.answering_model.clone(),
            parsing_model: self.metadata.parsing_model.clone(),
            replicate: self.metadata.replicate,
        }
    }

    /// True when abstention was detected and the override was applied.
    pub fn is_abstained(&self) -> bool {
        self.template.as_ref().is_some_and(|t| {
            t.abstention_detected == Some(true) && t.abstention_override_applied == Some(true)
        })
    }

    /// `completed_without_errors` as exported: the string `"abstained"` when
    /// the abstention override fired, the original boolean otherwise.
    pub fn export_completion_status(&self) -> Value {
        if self.is_abstained() {
            Value::String("abstained".to_string())
        } else {
            Value::Bool(self.metadata.completed_without_errors)
        }
    }

    /// JSON form used for dot-path field resolution.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Normalize the accepted results payload shapes into a list.
///
/// Accepts a bare array, an object with a `results` array, or an object
/// keyed by result id (the shape returned by the results endpoint). Keyed
/// objects are returned in key order.
pub fn parse_results(value: Value) -> Result<Vec<ExportableResult>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("results") {
            Some(Value::Array(items)) => items,
            Some(Value::Object(keyed)) => keyed.into_iter().map(|(_, v)| v).collect(),
            Some(other) => {
                return Err(KareninaError::InvalidResults(format!(
                    "`results` must be an array or object, got {}",
                    json_type_name(&other)
                )))
            }
            None if obj.contains_key("metadata") => vec![Value::Object(obj)],
            None => obj.into_iter().map(|(_, v)| v).collect(),
        },
        other => {
            return Err(KareninaError::InvalidResults(format!(
                "expected an array or object of results, got {}",
                json_type_name(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            serde_json::from_value(item).map_err(|e| {
                KareninaError::InvalidResults(format!("result #{}: {}", idx + 1, e))
            })
        })
        .collect()
}

/// Read and normalize a results file.
pub fn load_results(path: &Path) -> Result<Vec<ExportableResult>> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    parse_results(value)
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "metadata": {
                "question_id": "q1",
                "completed_without_errors": true,
                "answering_model": "openai/gpt-4.1-mini",
                "parsing_model": "openai/gpt-4.1-mini",
                "replicate": 1
            }
        })
    }

    #[test]
    fn parses_minimal_result() {
        let results = parse_results(json!([minimal()])).expect("parse");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.question_id, "q1");
        assert!(results[0].template.is_none());
        assert!(!results[0].is_abstained());
    }

    #[test]
    fn unknown_fields_survive_serialization() {
        let mut raw = minimal();
        raw["metadata"]["custom_tag"] = json!("nightly");
        raw["template"] = json!({"raw_llm_response": "42", "future_field": [1, 2]});

        let results = parse_results(json!([raw])).expect("parse");
        let back = results[0].to_value().expect("to_value");
        assert_eq!(back["metadata"]["custom_tag"], json!("nightly"));
        assert_eq!(back["template"]["future_field"], json!([1, 2]));
    }

    #[test]
    fn accepts_keyed_and_wrapped_shapes() {
        let keyed = json!({"r2": minimal(), "r1": minimal()});
        assert_eq!(parse_results(keyed).expect("keyed").len(), 2);

        let wrapped = json!({"results": [minimal(), minimal(), minimal()]});
        assert_eq!(parse_results(wrapped).expect("wrapped").len(), 3);

        let single = minimal();
        assert_eq!(parse_results(single).expect("single").len(), 1);
    }

    #[test]
    fn rejects_scalar_payload() {
        let err = parse_results(json!(42)).unwrap_err();
        assert!(err.to_string().contains("number"));
    }

    #[test]
    fn reports_index_of_malformed_result() {
        let err = parse_results(json!([minimal(), {"metadata": 7}])).unwrap_err();
        assert!(err.to_string().contains("result #2"));
    }

    #[test]
    fn abstention_requires_override() {
        let mut raw = minimal();
        raw["template"] = json!({"abstention_detected": true});
        let detected_only: ExportableResult = serde_json::from_value(raw.clone()).unwrap();
        assert!(!detected_only.is_abstained());
        assert_eq!(detected_only.export_completion_status(), json!(true));

        raw["template"]["abstention_override_applied"] = json!(true);
        let overridden: ExportableResult = serde_json::from_value(raw).unwrap();
        assert!(overridden.is_abstained());
        assert_eq!(overridden.export_completion_status(), json!("abstained"));
    }

    #[test]
    fn score_lookup_spans_evaluator_kinds() {
        let rubric = ResultRubric {
            llm_trait_scores: Some(BTreeMap::from([("clarity".to_string(), json!(4))])),
            regex_trait_scores: Some(BTreeMap::from([("has_citation".to_string(), json!(true))])),
            ..Default::default()
        };
        assert_eq!(rubric.score("clarity"), Some(&json!(4)));
        assert_eq!(rubric.score("has_citation"), Some(&json!(true)));
        assert_eq!(rubric.score("missing"), None);
        assert_eq!(rubric.all_scores().count(), 2);
    }
}
