//! Karenina backend client
//!
//! Async HTTP client for the Karenina server: verification and template
//! generation jobs, benchmark storage, rubrics, MCP validation and presets,
//! and ADeLe question classification.
//!
//! ## Jobs
//!
//! Long-running jobs are started with a single request and then polled.
//! [`JobPoller::watch`] returns a [`JobHandle`] whose `cancel` stops both the
//! backend job and the local poll loop.

pub mod client;
pub mod config;
pub mod error;
pub mod jobs;
pub mod mcp;
pub mod types;

pub use client::{KareninaClient, CSRF_HEADER};
pub use config::ClientConfig;
pub use error::{ClientError, ConfigError, Result};
pub use jobs::{JobHandle, JobOutcome, JobPoller};
pub use mcp::{McpBackend, McpController, SaveOutcome};
pub use types::{
    AdeleQuestion, AdeleTrait, BenchmarkSummary, ComparedModel,
    FinishedTemplate, HealthResponse, JobKind, JobProgress, JobStarted, JobStatus,
    ModelComparison, QuestionClassification, TemplateGenerationRequest, VerificationConfig,
    VerificationRequest, VerificationSummary,
};
