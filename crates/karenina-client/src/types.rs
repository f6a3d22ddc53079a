//! Request and response bodies exchanged with the backend.
//!
//! Responses are typed where the client relies on their shape; anything
//! else the backend sends is kept in `extra` maps.

use std::collections::BTreeMap;

use karenina_core::mcp::{McpPreset, McpTool, ValidationOutcome};
use karenina_core::{ModelConfiguration, Rubric, UnifiedCheckpoint};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "healthy")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CsrfTokenResponse {
    #[serde(alias = "csrf_token")]
    pub token: String,
}

/// Kind of long-running backend job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Verification,
    TemplateGeneration,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Verification => "verification",
            JobKind::TemplateGeneration => "template_generation",
        }
    }

    /// Path segments of the job collection under `/api/v2`.
    pub(crate) fn collection(&self) -> &'static [&'static str] {
        match self {
            JobKind::Verification => &["api", "v2", "verifications"],
            JobKind::TemplateGeneration => &["api", "v2", "templates", "generation"],
        }
    }
}

/// Backend job status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

/// Response of a job start request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStarted {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Progress snapshot of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobProgress {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub processed_count: u64,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Verification run settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationConfig {
    pub answering_models: Vec<ModelConfiguration>,
    pub parsing_models: Vec<ModelConfiguration>,
    #[serde(default = "default_replicates")]
    pub replicate_count: u32,
    #[serde(default)]
    pub rubric_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_trait_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_mode: Option<String>,
    #[serde(default)]
    pub abstention_enabled: bool,
    #[serde(default)]
    pub deep_judgment_enabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_replicates() -> u32 {
    1
}

/// A question whose template is ready for verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinishedTemplate {
    pub question_id: String,
    pub question_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_answer: Option<String>,
    pub template_code: String,
    pub last_modified: String,
    #[serde(default = "default_finished")]
    pub finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_rubric: Option<Rubric>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

fn default_finished() -> bool {
    true
}

impl FinishedTemplate {
    /// Finished questions of a checkpoint, in question-id order.
    pub fn from_checkpoint(cp: &UnifiedCheckpoint) -> Vec<FinishedTemplate> {
        cp.checkpoint
            .iter()
            .filter(|(_, item)| item.finished)
            .map(|(id, item)| FinishedTemplate {
                question_id: id.clone(),
                question_text: item.question.clone(),
                raw_answer: Some(item.raw_answer.clone()),
                template_code: item.answer_template.clone(),
                last_modified: item.last_modified.clone(),
                finished: true,
                question_rubric: item.question_rubric.clone(),
                keywords: item.keywords.clone(),
            })
            .collect()
    }
}

/// `POST /api/v2/verifications`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationRequest {
    pub config: VerificationConfig,
    pub finished_templates: Vec<FinishedTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark_name: Option<String>,
}

/// `POST /api/v2/templates/generation`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateGenerationRequest {
    /// Question id → question record (`question`, `raw_answer`, ...).
    pub questions: BTreeMap<String, Value>,
    pub config: ModelConfiguration,
    #[serde(default)]
    pub force_regenerate: bool,
}

/// A benchmark stored behind a storage URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BenchmarkList {
    pub benchmarks: Vec<BenchmarkSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SaveBenchmarkRequest<'a> {
    pub storage_url: &'a str,
    pub checkpoint: &'a UnifiedCheckpoint,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BenchmarkPayload {
    pub checkpoint: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PresetList {
    pub presets: Vec<McpPreset>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct McpValidationRequest<'a> {
    pub server_name: &'a str,
    pub server_url: &'a str,
}

/// Tools may be reported as bare names or as objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ReportedTool {
    Name(String),
    Tool(McpTool),
}

impl From<ReportedTool> for McpTool {
    fn from(t: ReportedTool) -> Self {
        match t {
            ReportedTool::Name(name) => McpTool::new(name),
            ReportedTool::Tool(tool) => tool,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct McpValidationResponse {
    pub success: bool,
    #[serde(default)]
    pub tools: Vec<ReportedTool>,
    #[serde(default)]
    pub error: Option<String>,
}

impl From<McpValidationResponse> for ValidationOutcome {
    fn from(r: McpValidationResponse) -> Self {
        if r.success {
            ValidationOutcome::Valid {
                tools: r.tools.into_iter().map(McpTool::from).collect(),
            }
        } else {
            ValidationOutcome::Invalid {
                error: r
                    .error
                    .unwrap_or_else(|| "server validation failed".to_string()),
            }
        }
    }
}

/// `POST /api/v2/verifications/summary`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationSummary {
    #[serde(default)]
    pub num_results: u64,
    #[serde(default)]
    pub num_completed: u64,
    #[serde(default)]
    pub num_with_template: u64,
    #[serde(default)]
    pub num_with_rubric: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A model to include in a comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparedModel {
    pub answering_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_config: Option<String>,
}

/// `POST /api/v2/verifications/compare-models`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelComparison {
    #[serde(default)]
    pub model_summaries: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heatmap_data: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One ADeLe dimension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdeleTrait {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AdeleTraitList {
    pub traits: Vec<AdeleTrait>,
}

/// A question submitted for ADeLe classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdeleQuestion {
    pub question_id: String,
    pub question_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ClassifyRequest<'a> {
    pub questions: &'a [AdeleQuestion],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trait_names: Option<&'a [String]>,
}

/// Classification of one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionClassification {
    pub question_id: String,
    /// Trait name → class label.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Trait name → ordinal level.
    #[serde(default)]
    pub scores: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classified_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ClassifyResponse {
    pub classifications: Vec<QuestionClassification>,
}
