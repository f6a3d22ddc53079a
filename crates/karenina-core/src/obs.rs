//! Structured observability hooks for exports, checkpoints, MCP validation
//! and backend jobs.
//!
//! Events are emitted at `info!` level unless noted (filter with `RUST_LOG`).
//! For JSON output, initialise tracing with `json = true`.

use tracing::{info, warn};

/// Span carrying `kind` and `job_id` for everything logged about one job.
///
/// # Example
///
/// ```ignore
/// poll_job(job_id).instrument(job_span("verification", "job-12345")).await;
/// ```
pub fn job_span(kind: &str, job_id: &str) -> tracing::Span {
    tracing::info_span!("karenina.job", kind = %kind, job_id = %job_id)
}

/// Emit event: an export document was built.
pub fn emit_export_built(format: &str, rows: usize, columns: usize) {
    info!(event = "export.built", format = %format, rows = rows, columns = columns);
}

/// Emit event: a checkpoint was converted between formats.
pub fn emit_checkpoint_converted(direction: &str, questions: usize, global_traits: usize) {
    info!(
        event = "checkpoint.converted",
        direction = %direction,
        questions = questions,
        global_traits = global_traits,
    );
}

/// Emit event: checkpoint validation rejected a document (warning level).
pub fn emit_checkpoint_rejected(violations: usize) {
    warn!(event = "checkpoint.rejected", violations = violations);
}

/// Emit event: MCP server validation started.
pub fn emit_mcp_validation_started(server: &str, generation: u64) {
    info!(event = "mcp.validation_started", server = %server, generation = generation);
}

/// Emit event: MCP server validation finished.
pub fn emit_mcp_validation_finished(server: &str, valid: bool, tools: usize, phantom: usize) {
    info!(
        event = "mcp.validation_finished",
        server = %server,
        valid = valid,
        tools = tools,
        phantom = phantom,
    );
}

/// Emit event: a validation response arrived for a superseded request.
pub fn emit_mcp_validation_stale(server: &str, generation: u64) {
    warn!(event = "mcp.validation_stale", server = %server, generation = generation);
}

/// Emit event: job progress update.
pub fn emit_job_progress(job_id: &str, status: &str, completed: u64, total: u64) {
    info!(
        event = "job.progress",
        job_id = %job_id,
        status = %status,
        completed = completed,
        total = total,
    );
}

/// Emit event: job cancelled by the user.
pub fn emit_job_cancelled(job_id: &str) {
    info!(event = "job.cancelled", job_id = %job_id);
}

/// Emit event: backend request failed (warning level).
pub fn emit_request_failed(endpoint: &str, error: &dyn std::fmt::Display) {
    warn!(event = "request.failed", endpoint = %endpoint, error = %error);
}
