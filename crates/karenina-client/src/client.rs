//! HTTP client for the backend REST API.

use std::sync::Arc;

use karenina_core::checkpoint::{
    jsonld_to_v2, validate_jsonld_checkpoint, CheckpointFormat, JsonLdCheckpoint,
};
use karenina_core::mcp::{McpPreset, ValidationOutcome};
use karenina_core::{obs, parse_results, ExportableResult, Rubric, UnifiedCheckpoint};
use reqwest::{Method, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, ConfigError, Result};
use crate::types::{
    AdeleQuestion, AdeleTrait, AdeleTraitList, BenchmarkList, BenchmarkPayload, BenchmarkSummary,
    ClassifyRequest, ClassifyResponse, ComparedModel, CsrfTokenResponse, HealthResponse, JobKind,
    JobProgress, JobStarted, McpValidationRequest, McpValidationResponse, ModelComparison,
    PresetList, QuestionClassification, SaveBenchmarkRequest, TemplateGenerationRequest,
    VerificationRequest, VerificationSummary,
};

/// Header carrying the CSRF token on mutating requests.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Keys checked, in order, for a human-readable error in a failed response.
const ERROR_KEYS: [&str; 3] = ["detail", "error", "message"];

/// Backend API client.
///
/// Cheap to clone; clones share the connection pool and the cached CSRF token.
#[derive(Clone)]
pub struct KareninaClient {
    config: ClientConfig,
    base_url: Url,
    http_client: reqwest::Client,
    csrf_token: Arc<Mutex<Option<String>>>,
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(v) = serde_json::from_slice::<Value>(body) {
        for key in ERROR_KEYS {
            match v.get(key) {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) => return s.clone(),
                Some(other) => return other.to_string(),
            }
        }
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        text
    }
}

async fn decode<T: DeserializeOwned>(endpoint: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: error_message(status, &body),
        });
    }
    let body: &[u8] = if body.is_empty() { b"null" } else { &body };
    serde_json::from_slice(body).map_err(|e| ClientError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

impl KareninaClient {
    /// Create a client for the configured backend.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: "api_url".to_string(),
            value: format!("{} ({reason})", config.api_url),
        };
        let base_url = Url::parse(&config.api_url).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_string()).into());
        }

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .build()?;

        Ok(KareninaClient {
            config,
            base_url,
            http_client,
            csrf_token: Arc::new(Mutex::new(None)),
        })
    }

    /// Create a client from `KARENINA_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::load(None)?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn job_url(&self, kind: JobKind, job_id: &str, action: Option<&str>) -> Url {
        let mut segments: Vec<&str> = kind.collection().to_vec();
        segments.push(job_id);
        segments.extend(action);
        self.url(&segments)
    }

    fn with_storage(mut url: Url, storage_url: &str) -> Url {
        url.query_pairs_mut().append_pair("storage_url", storage_url);
        url
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T> {
        let endpoint = url.path().to_string();
        let result = self.execute_inner(method, url, body, &endpoint).await;
        if let Err(err) = &result {
            obs::emit_request_failed(&endpoint, err);
        }
        result
    }

    async fn execute_inner<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        endpoint: &str,
    ) -> Result<T> {
        let mutating = !matches!(method, Method::GET | Method::HEAD);
        let mut refreshed = false;
        loop {
            let mut request = self.http_client.request(method.clone(), url.clone());
            if let Some(body) = &body {
                request = request.json(body);
            }
            if mutating {
                request = request.header(CSRF_HEADER, self.csrf_token().await?);
            }

            debug!(method = %method, endpoint = %endpoint, "backend request");
            let response = request.send().await?;

            if mutating && response.status() == StatusCode::FORBIDDEN && !refreshed {
                debug!(endpoint = %endpoint, "request forbidden, refreshing CSRF token");
                self.csrf_token.lock().await.take();
                refreshed = true;
                continue;
            }
            return decode(endpoint, response).await;
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.execute(Method::GET, url, None).await
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.execute(method, url, Some(body)).await
    }

    // ── Session ─────────────────────────────────────────────────────────

    /// `GET /api/health`
    pub async fn health(&self) -> Result<HealthResponse> {
        self.get(self.url(&["api", "health"])).await
    }

    /// CSRF token for mutating requests, fetched once and cached.
    pub async fn csrf_token(&self) -> Result<String> {
        let mut cached = self.csrf_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        // Not routed through `execute`, which calls back into this method.
        let url = self.url(&["api", "csrf-token"]);
        let endpoint = url.path().to_string();
        debug!(endpoint = %endpoint, "fetching CSRF token");
        let response = match self.http_client.get(url).send().await {
            Ok(response) => decode::<CsrfTokenResponse>(&endpoint, response).await,
            Err(err) => Err(err.into()),
        };
        let response = response.inspect_err(|err| obs::emit_request_failed(&endpoint, err))?;
        *cached = Some(response.token.clone());
        Ok(response.token)
    }

    // ── Jobs ────────────────────────────────────────────────────────────

    /// Progress of a verification or template-generation job.
    pub async fn job_progress(&self, kind: JobKind, job_id: &str) -> Result<JobProgress> {
        self.get(self.job_url(kind, job_id, Some("progress"))).await
    }

    /// Ask the backend to cancel a job.
    pub async fn cancel_job(&self, kind: JobKind, job_id: &str) -> Result<()> {
        let _: IgnoredAny = self
            .execute(Method::POST, self.job_url(kind, job_id, Some("cancel")), None)
            .await?;
        obs::emit_job_cancelled(job_id);
        Ok(())
    }

    /// `POST /api/v2/verifications`
    pub async fn start_verification(&self, request: &VerificationRequest) -> Result<JobStarted> {
        let started: JobStarted = self
            .send(Method::POST, self.url(JobKind::Verification.collection()), request)
            .await?;
        info!(job_id = %started.job_id, questions = request.finished_templates.len(), "verification started");
        Ok(started)
    }

    pub async fn verification_progress(&self, job_id: &str) -> Result<JobProgress> {
        self.job_progress(JobKind::Verification, job_id).await
    }

    /// Results of a finished verification job.
    pub async fn verification_results(&self, job_id: &str) -> Result<Vec<ExportableResult>> {
        let url = self.job_url(JobKind::Verification, job_id, Some("results"));
        let endpoint = url.path().to_string();
        let raw: Value = self.get(url).await?;
        parse_results(raw).map_err(|e| ClientError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }

    pub async fn cancel_verification(&self, job_id: &str) -> Result<()> {
        self.cancel_job(JobKind::Verification, job_id).await
    }

    /// `DELETE /api/v2/verifications/{job_id}`
    pub async fn delete_verification(&self, job_id: &str) -> Result<()> {
        let _: IgnoredAny = self
            .execute(
                Method::DELETE,
                self.job_url(JobKind::Verification, job_id, None),
                None,
            )
            .await?;
        Ok(())
    }

    /// `POST /api/v2/templates/generation`
    pub async fn start_template_generation(
        &self,
        request: &TemplateGenerationRequest,
    ) -> Result<JobStarted> {
        self.send(
            Method::POST,
            self.url(JobKind::TemplateGeneration.collection()),
            request,
        )
        .await
    }

    pub async fn template_generation_progress(&self, job_id: &str) -> Result<JobProgress> {
        self.job_progress(JobKind::TemplateGeneration, job_id).await
    }

    pub async fn cancel_template_generation(&self, job_id: &str) -> Result<()> {
        self.cancel_job(JobKind::TemplateGeneration, job_id).await
    }

    // ── Benchmarks ──────────────────────────────────────────────────────

    /// Benchmarks stored at `storage_url` (e.g. `sqlite:///dbs/karenina.db`).
    pub async fn list_benchmarks(&self, storage_url: &str) -> Result<Vec<BenchmarkSummary>> {
        let url = Self::with_storage(self.url(&["api", "v2", "benchmarks"]), storage_url);
        let list: BenchmarkList = self.get(url).await?;
        Ok(list.benchmarks)
    }

    /// Load a benchmark; JSON-LD payloads are validated and converted.
    pub async fn load_benchmark(&self, storage_url: &str, name: &str) -> Result<UnifiedCheckpoint> {
        let url = Self::with_storage(self.url(&["api", "v2", "benchmarks", name]), storage_url);
        let payload: BenchmarkPayload = self.get(url).await?;
        match CheckpointFormat::detect(&payload.checkpoint) {
            CheckpointFormat::JsonLd => {
                validate_jsonld_checkpoint(&payload.checkpoint)?;
                let doc: JsonLdCheckpoint = serde_json::from_value(payload.checkpoint)?;
                Ok(jsonld_to_v2(&doc)?)
            }
            CheckpointFormat::Unified => Ok(serde_json::from_value(payload.checkpoint)?),
        }
    }

    pub async fn save_benchmark(
        &self,
        storage_url: &str,
        name: &str,
        checkpoint: &UnifiedCheckpoint,
    ) -> Result<()> {
        let body = SaveBenchmarkRequest {
            storage_url,
            checkpoint,
        };
        let _: IgnoredAny = self
            .send(Method::PUT, self.url(&["api", "v2", "benchmarks", name]), &body)
            .await?;
        Ok(())
    }

    pub async fn delete_benchmark(&self, storage_url: &str, name: &str) -> Result<()> {
        let url = Self::with_storage(self.url(&["api", "v2", "benchmarks", name]), storage_url);
        let _: IgnoredAny = self.execute(Method::DELETE, url, None).await?;
        Ok(())
    }

    // ── Rubric ──────────────────────────────────────────────────────────

    /// The current global rubric, if one is set.
    pub async fn get_rubric(&self) -> Result<Option<Rubric>> {
        self.get(self.url(&["api", "v2", "rubric"])).await
    }

    pub async fn set_rubric(&self, rubric: &Rubric) -> Result<()> {
        let _: IgnoredAny = self
            .send(Method::PUT, self.url(&["api", "v2", "rubric"]), rubric)
            .await?;
        Ok(())
    }

    // ── MCP ─────────────────────────────────────────────────────────────

    pub async fn list_mcp_presets(&self) -> Result<Vec<McpPreset>> {
        let list: PresetList = self.get(self.url(&["api", "v2", "mcp", "presets"])).await?;
        Ok(list.presets)
    }

    pub async fn save_mcp_preset(&self, preset: &McpPreset) -> Result<()> {
        let url = self.url(&["api", "v2", "mcp", "presets", &preset.name]);
        let _: IgnoredAny = self.send(Method::PUT, url, preset).await?;
        Ok(())
    }

    pub async fn delete_mcp_preset(&self, name: &str) -> Result<()> {
        let url = self.url(&["api", "v2", "mcp", "presets", name]);
        let _: IgnoredAny = self.execute(Method::DELETE, url, None).await?;
        Ok(())
    }

    /// Ask the backend to connect to a tool server and list its tools.
    ///
    /// A server the backend cannot reach is reported as
    /// [`ValidationOutcome::Invalid`], not as an error.
    pub async fn validate_mcp_server(&self, name: &str, url: &str) -> Result<ValidationOutcome> {
        let body = McpValidationRequest {
            server_name: name,
            server_url: url,
        };
        let response: McpValidationResponse = self
            .send(Method::POST, self.url(&["api", "v2", "mcp", "validate"]), &body)
            .await?;
        Ok(response.into())
    }

    // ── Summaries ───────────────────────────────────────────────────────

    pub async fn verification_summary(
        &self,
        results: &[ExportableResult],
        run_name: Option<&str>,
    ) -> Result<VerificationSummary> {
        let body = json!({ "results": results, "run_name": run_name });
        self.send(
            Method::POST,
            self.url(&["api", "v2", "verifications", "summary"]),
            &body,
        )
        .await
    }

    pub async fn compare_models(
        &self,
        results: &[ExportableResult],
        models: &[ComparedModel],
        parsing_model: Option<&str>,
    ) -> Result<ModelComparison> {
        let body = json!({
            "results": results,
            "models": models,
            "parsing_model": parsing_model,
        });
        self.send(
            Method::POST,
            self.url(&["api", "v2", "verifications", "compare-models"]),
            &body,
        )
        .await
    }

    // ── ADeLe ───────────────────────────────────────────────────────────

    pub async fn adele_traits(&self) -> Result<Vec<AdeleTrait>> {
        let list: AdeleTraitList = self.get(self.url(&["api", "v2", "adele", "traits"])).await?;
        Ok(list.traits)
    }

    /// Classify questions along the given ADeLe traits (all traits when `None`).
    pub async fn classify_questions(
        &self,
        questions: &[AdeleQuestion],
        trait_names: Option<&[String]>,
    ) -> Result<Vec<QuestionClassification>> {
        let body = ClassifyRequest {
            questions,
            trait_names,
        };
        let response: ClassifyResponse = self
            .send(Method::POST, self.url(&["api", "v2", "adele", "classify"]), &body)
            .await?;
        Ok(response.classifications)
    }
}
