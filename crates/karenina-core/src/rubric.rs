//! Rubric definitions: the evaluation criteria applied to a model answer.
//!
//! A [`Rubric`] groups traits by evaluator kind. The same shape is used for
//! the global rubric and for question-specific rubrics.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Output kind of an LLM-judged or callable trait.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    Boolean,
    Score,
}

impl TraitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Score => "score",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "boolean" => Some(Self::Boolean),
            "score" => Some(Self::Score),
            _ => None,
        }
    }
}

/// A trait judged by the parsing LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmRubricTrait {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: TraitKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<i64>,
    #[serde(default = "default_true")]
    pub higher_is_better: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_excerpt_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_max_excerpts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_fuzzy_match_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_excerpt_retry_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_search_enabled: Option<bool>,
}

impl LlmRubricTrait {
    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            kind: TraitKind::Boolean,
            min_score: None,
            max_score: None,
            higher_is_better: true,
            deep_judgment_enabled: None,
            deep_judgment_excerpt_enabled: None,
            deep_judgment_max_excerpts: None,
            deep_judgment_fuzzy_match_threshold: None,
            deep_judgment_excerpt_retry_attempts: None,
            deep_judgment_search_enabled: None,
        }
    }

    pub fn score(
        name: impl Into<String>,
        description: impl Into<String>,
        min_score: i64,
        max_score: i64,
    ) -> Self {
        Self {
            kind: TraitKind::Score,
            min_score: Some(min_score),
            max_score: Some(max_score),
            ..Self::boolean(name, description)
        }
    }
}

/// A trait evaluated by matching a regular expression against the answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegexTrait {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub pattern: String,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub case_sensitive: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub invert_result: bool,
    #[serde(default = "default_true")]
    pub higher_is_better: bool,
}

/// A trait evaluated by a serialized user function on the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallableTrait {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: TraitKind,
    /// Base64-encoded serialized callable.
    pub callable_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<i64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub invert_result: bool,
    #[serde(default = "default_true")]
    pub higher_is_better: bool,
}

/// How a metric trait builds its confusion matrix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricEvaluationMode {
    TpOnly,
    FullMatrix,
}

impl MetricEvaluationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TpOnly => "tp_only",
            Self::FullMatrix => "full_matrix",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tp_only" => Some(Self::TpOnly),
            "full_matrix" => Some(Self::FullMatrix),
            _ => None,
        }
    }
}

/// A trait scored with classification metrics over extracted items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRubricTrait {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub evaluation_mode: MetricEvaluationMode,
    pub metrics: Vec<String>,
    pub tp_instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tn_instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeated_extraction: Option<bool>,
    #[serde(default = "default_true")]
    pub higher_is_better: bool,
}

/// A set of traits grouped by evaluator kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Rubric {
    #[serde(default)]
    pub llm_traits: Vec<LlmRubricTrait>,
    #[serde(default)]
    pub regex_traits: Vec<RegexTrait>,
    #[serde(default)]
    pub callable_traits: Vec<CallableTrait>,
    #[serde(default)]
    pub metric_traits: Vec<MetricRubricTrait>,
}

impl Rubric {
    pub fn is_empty(&self) -> bool {
        self.llm_traits.is_empty()
            && self.regex_traits.is_empty()
            && self.callable_traits.is_empty()
            && self.metric_traits.is_empty()
    }

    /// All trait names in evaluator-kind order.
    pub fn trait_names(&self) -> Vec<&str> {
        self.llm_traits
            .iter()
            .map(|t| t.name.as_str())
            .chain(self.regex_traits.iter().map(|t| t.name.as_str()))
            .chain(self.callable_traits.iter().map(|t| t.name.as_str()))
            .chain(self.metric_traits.iter().map(|t| t.name.as_str()))
            .collect()
    }

    pub fn contains_trait(&self, name: &str) -> bool {
        self.trait_names().contains(&name)
    }
}
