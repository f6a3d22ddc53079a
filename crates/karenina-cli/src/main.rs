//! Karenina CLI
//!
//! The `karenina` command works on verification results and benchmark
//! checkpoints locally, and drives verification jobs and MCP servers on a
//! Karenina backend.
//!
//! ## Commands
//!
//! - `export`: Build CSV or JSON exports from verification results
//! - `checkpoint`: Convert and validate JSON-LD checkpoints
//! - `health`: Check that the backend is reachable
//! - `verify`: Start, watch and cancel verification jobs
//! - `mcp`: Validate MCP servers and list presets

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use karenina_client::{
    ClientConfig, FinishedTemplate, JobKind, JobOutcome, JobPoller, JobProgress, KareninaClient,
    McpController, VerificationConfig, VerificationRequest,
};
use karenina_core::mcp::{McpServerStatus, ValidationApplied};
use karenina_core::{
    build_json_export, get_all_export_fields, load_results, parse_jsonld_checkpoint,
    read_checkpoint_file, validate_jsonld_checkpoint, write_csv, write_json_export,
    write_jsonld_checkpoint, write_unified_checkpoint, ExportOptions, Rubric,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "karenina")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Karenina benchmark exports, checkpoints and verification jobs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Client config file (TOML)
    #[arg(long, global = true, env = "KARENINA_CONFIG")]
    config: Option<PathBuf>,

    /// Backend URL, overrides config and environment
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export verification results
    Export {
        #[command(subcommand)]
        action: ExportAction,
    },

    /// Convert or validate benchmark checkpoints
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// Check backend health
    Health,

    /// Run verification jobs on the backend
    Verify {
        #[command(subcommand)]
        action: VerifyAction,
    },

    /// Manage MCP tool servers
    Mcp {
        #[command(subcommand)]
        action: McpAction,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExportFormat {
    Csv,
    Json,
}

#[derive(Args)]
struct ExportArgs {
    /// Results file (array, `{"results": ...}` or keyed object)
    #[arg(short, long)]
    results: PathBuf,

    /// Global rubric file; its traits get their own CSV columns
    #[arg(long)]
    rubric: Option<PathBuf>,

    /// Comma-separated field keys (default: all fields)
    #[arg(long, value_delimiter = ',')]
    fields: Option<Vec<String>>,

    /// Job id recorded in JSON export metadata
    #[arg(long)]
    job_id: Option<String>,

    /// Output path
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Subcommand)]
enum ExportAction {
    /// Write results as CSV
    Csv(ExportArgs),

    /// Write results as a JSON export document
    Json(ExportArgs),

    /// List exportable field keys
    Fields,
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// Convert a checkpoint to JSON-LD
    ToJsonld {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Convert a JSON-LD checkpoint to the native format
    FromJsonld {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Report every structural problem in a JSON-LD checkpoint
    Validate { input: PathBuf },
}

#[derive(Subcommand)]
enum VerifyAction {
    /// Start verifying the finished questions of a checkpoint
    Start {
        /// Benchmark checkpoint (native or JSON-LD)
        #[arg(short, long)]
        checkpoint: PathBuf,

        /// Verification config file (JSON)
        #[arg(long = "run-config")]
        run_config: PathBuf,

        #[arg(long)]
        run_name: Option<String>,

        /// Poll until the job finishes
        #[arg(long)]
        watch: bool,
    },

    /// Show job progress
    Status { job_id: String },

    /// Poll a job until it finishes; Ctrl-C cancels it
    Watch { job_id: String },

    /// Fetch results of a finished job
    Results {
        job_id: String,

        /// Write results to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Cancel a running job
    Cancel { job_id: String },
}

#[derive(Subcommand)]
enum McpAction {
    /// Validate a server and list its tools
    Validate {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
    },

    /// List presets stored on the backend
    Presets,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    karenina_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Export { action } => match action {
            ExportAction::Csv(args) => cmd_export(ExportFormat::Csv, args),
            ExportAction::Json(args) => cmd_export(ExportFormat::Json, args),
            ExportAction::Fields => cmd_export_fields(),
        },
        Commands::Checkpoint { action } => match action {
            CheckpointAction::ToJsonld { input, output } => cmd_to_jsonld(&input, &output),
            CheckpointAction::FromJsonld { input, output } => cmd_from_jsonld(&input, &output),
            CheckpointAction::Validate { input } => cmd_checkpoint_validate(&input),
        },
        Commands::Health => {
            let client = connect(cli.config.as_deref(), cli.api_url.as_deref())?;
            cmd_health(&client).await
        }
        Commands::Verify { action } => {
            let client = connect(cli.config.as_deref(), cli.api_url.as_deref())?;
            match action {
                VerifyAction::Start {
                    checkpoint,
                    run_config,
                    run_name,
                    watch,
                } => cmd_verify_start(&client, &checkpoint, &run_config, run_name, watch).await,
                VerifyAction::Status { job_id } => cmd_verify_status(&client, &job_id).await,
                VerifyAction::Watch { job_id } => cmd_verify_watch(&client, &job_id).await,
                VerifyAction::Results { job_id, output } => {
                    cmd_verify_results(&client, &job_id, output.as_deref()).await
                }
                VerifyAction::Cancel { job_id } => cmd_verify_cancel(&client, &job_id).await,
            }
        }
        Commands::Mcp { action } => {
            let client = connect(cli.config.as_deref(), cli.api_url.as_deref())?;
            match action {
                McpAction::Validate { name, url } => cmd_mcp_validate(client, &name, &url).await,
                McpAction::Presets => cmd_mcp_presets(client).await,
            }
        }
    }
}

fn connect(config: Option<&Path>, api_url: Option<&str>) -> Result<KareninaClient> {
    let config = ClientConfig::load(config)
        .context("Failed to load client config")?
        .with_api_url(api_url);
    KareninaClient::new(config).context("Failed to create backend client")
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn cmd_export(format: ExportFormat, args: ExportArgs) -> Result<()> {
    let ExportArgs {
        results: results_path,
        rubric: rubric_path,
        fields,
        job_id,
        output,
    } = args;
    let results = load_results(&results_path)
        .with_context(|| format!("Failed to load results from {}", results_path.display()))?;
    let rubric: Option<Rubric> = rubric_path.as_deref().map(read_json_file).transpose()?;

    let mut options = ExportOptions::default();
    if let Some(fields) = fields {
        options = options.with_fields(fields);
    }
    if let Some(job_id) = job_id {
        options = options.with_job_id(job_id);
    }

    match format {
        ExportFormat::Csv => write_csv(&output, &results, rubric.as_ref(), &options)?,
        ExportFormat::Json => {
            let doc = build_json_export(&results, rubric.as_ref(), &options)?;
            write_json_export(&output, &doc)?;
        }
    }

    println!(
        "✓ Exported {} results to {}",
        results.len(),
        output.display()
    );
    Ok(())
}

fn cmd_export_fields() -> Result<()> {
    for field in get_all_export_fields() {
        let source = if field.has_path() { field.path } else { "(computed)" };
        println!("{:<36} {}", field.key, source);
    }
    Ok(())
}

fn cmd_to_jsonld(input: &Path, output: &Path) -> Result<()> {
    let checkpoint = read_checkpoint_file(input)
        .with_context(|| format!("Failed to read checkpoint {}", input.display()))?;
    write_jsonld_checkpoint(output, &checkpoint)?;
    println!(
        "✓ Wrote {} questions as JSON-LD to {}",
        checkpoint.checkpoint.len(),
        output.display()
    );
    Ok(())
}

fn cmd_from_jsonld(input: &Path, output: &Path) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let checkpoint = parse_jsonld_checkpoint(&content)
        .with_context(|| format!("Invalid JSON-LD checkpoint {}", input.display()))?;
    write_unified_checkpoint(output, &checkpoint)?;
    println!(
        "✓ Wrote {} questions to {}",
        checkpoint.checkpoint.len(),
        output.display()
    );
    Ok(())
}

fn cmd_checkpoint_validate(input: &Path) -> Result<()> {
    let doc: Value = read_json_file(input)?;
    match validate_jsonld_checkpoint(&doc) {
        Ok(()) => {
            println!("✓ {} is a valid JSON-LD checkpoint", input.display());
            Ok(())
        }
        Err(err) => {
            for violation in &err.violations {
                println!("  ✗ {violation}");
            }
            bail!("{} failed validation", input.display())
        }
    }
}

async fn cmd_health(client: &KareninaClient) -> Result<()> {
    let health = client
        .health()
        .await
        .with_context(|| format!("Backend at {} is unreachable", client.config().api_url))?;
    if !health.is_healthy() {
        bail!("Backend reports status '{}'", health.status);
    }
    println!("✓ {} is healthy", client.config().api_url);
    Ok(())
}

async fn cmd_verify_start(
    client: &KareninaClient,
    checkpoint_path: &Path,
    run_config_path: &Path,
    run_name: Option<String>,
    watch: bool,
) -> Result<()> {
    let checkpoint = read_checkpoint_file(checkpoint_path)
        .with_context(|| format!("Failed to read checkpoint {}", checkpoint_path.display()))?;
    let config: VerificationConfig = read_json_file(run_config_path)?;

    let finished_templates = FinishedTemplate::from_checkpoint(&checkpoint);
    if finished_templates.is_empty() {
        bail!("Checkpoint has no finished questions to verify");
    }

    let request = VerificationRequest {
        config,
        finished_templates,
        run_name,
        storage_url: None,
        benchmark_name: None,
    };
    let started = client.start_verification(&request).await?;
    println!("✓ Started verification job {}", started.job_id);

    if watch {
        cmd_verify_watch(client, &started.job_id).await?;
    }
    Ok(())
}

fn print_progress(p: &JobProgress) {
    let current = p.current_question.as_deref().unwrap_or("-");
    println!(
        "  [{:>5.1}%] {} {}/{} {}",
        p.percentage,
        p.status.as_str(),
        p.processed_count,
        p.total_count,
        current
    );
}

async fn cmd_verify_status(client: &KareninaClient, job_id: &str) -> Result<()> {
    let progress = client.verification_progress(job_id).await?;
    print_progress(&progress);
    if let Some(error) = &progress.error {
        println!("  error: {error}");
    }
    Ok(())
}

async fn cmd_verify_watch(client: &KareninaClient, job_id: &str) -> Result<()> {
    let mut handle = JobPoller::new(client.clone()).watch(JobKind::Verification, job_id, |p| {
        print_progress(p)
    });

    let finished = tokio::select! {
        outcome = handle.wait() => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };
    let outcome = match finished {
        Some(outcome) => outcome?,
        None => {
            info!(job_id = %job_id, "interrupted, cancelling job");
            if let Err(e) = handle.cancel().await {
                warn!(job_id = %job_id, error = %e, "backend cancel failed");
            }
            handle.wait().await?
        }
    };

    match outcome {
        JobOutcome::Finished(progress) => match &progress.error {
            Some(error) => bail!("Job {job_id} {}: {error}", progress.status.as_str()),
            None => println!("✓ Job {job_id} {}", progress.status.as_str()),
        },
        JobOutcome::Cancelled => println!("Job {job_id} cancelled"),
    }
    Ok(())
}

async fn cmd_verify_results(
    client: &KareninaClient,
    job_id: &str,
    output: Option<&Path>,
) -> Result<()> {
    let results = client.verification_results(job_id).await?;
    let json = serde_json::to_string_pretty(&results)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Saved {} results to {}", results.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn cmd_verify_cancel(client: &KareninaClient, job_id: &str) -> Result<()> {
    client.cancel_verification(job_id).await?;
    println!("✓ Cancelled job {job_id}");
    Ok(())
}

async fn cmd_mcp_validate(client: KareninaClient, name: &str, url: &str) -> Result<()> {
    let presets_enabled = client.config().mcp_presets_enabled;
    let mut controller = McpController::new(client, presets_enabled);
    controller.state_mut().add_server(name, url)?;

    if let ValidationApplied::Stale = controller.validate(name).await? {
        bail!("Validation of {name} was superseded");
    }
    let server = controller
        .state()
        .server(name)
        .context("Server vanished during validation")?;

    match server.status {
        McpServerStatus::Valid => {
            println!("✓ {} ({}) provides {} tools", server.name, server.url, server.tools.len());
            for tool in &server.tools {
                match &tool.description {
                    Some(desc) => println!("  - {}: {desc}", tool.name),
                    None => println!("  - {}", tool.name),
                }
            }
            Ok(())
        }
        _ => bail!(
            "{} is invalid: {}",
            server.name,
            server.error.as_deref().unwrap_or("validation failed")
        ),
    }
}

async fn cmd_mcp_presets(client: KareninaClient) -> Result<()> {
    let presets_enabled = client.config().mcp_presets_enabled;
    let mut controller = McpController::new(client, presets_enabled);
    let presets = controller.load_presets().await?;
    if presets.is_empty() {
        println!("No MCP presets available");
        return Ok(());
    }
    for preset in presets {
        let tools = match &preset.tools {
            Some(tools) => tools.join(", "),
            None => "all tools".to_string(),
        };
        println!("{:<20} {} [{tools}]", preset.name, preset.url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }

    fn results_fixture() -> Value {
        json!([
            {
                "metadata": {
                    "question_id": "q1",
                    "answering_model": "openai/gpt-4.1-mini",
                    "parsing_model": "openai/gpt-4.1-mini",
                    "completed_without_errors": true
                },
                "rubric": { "llm_trait_scores": { "clarity": 4, "safety": true } }
            }
        ])
    }

    fn checkpoint_fixture() -> Value {
        json!({
            "version": "2.0",
            "checkpoint": {
                "q1": {
                    "question": "What is the target of Venetoclax?",
                    "raw_answer": "BCL2",
                    "original_answer_template": "class Answer(BaseAnswer):\n    target: str\n",
                    "answer_template": "class Answer(BaseAnswer):\n    target: str\n",
                    "last_modified": "2026-05-02T09:30:00Z",
                    "finished": true
                }
            }
        })
    }

    #[test]
    fn test_export_csv_splits_global_and_question_specific_traits() {
        let dir = tempfile::tempdir().unwrap();
        let results = write_json(dir.path(), "results.json", &results_fixture());
        let rubric = write_json(
            dir.path(),
            "rubric.json",
            &json!({ "llm_traits": [{ "name": "clarity", "kind": "score", "min_score": 1, "max_score": 5 }] }),
        );
        let output = dir.path().join("out.csv");

        let args = ExportArgs {
            results,
            rubric: Some(rubric),
            fields: Some(vec!["question_id".to_string()]),
            job_id: None,
            output: output.clone(),
        };
        cmd_export(ExportFormat::Csv, args).unwrap();

        let csv = std::fs::read_to_string(&output).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("question_id,rubric_clarity,question_specific_rubrics")
        );
        assert_eq!(lines.next(), Some(r#"q1,4,"{""safety"":true}""#));
    }

    #[test]
    fn test_export_json_records_job_id() {
        let dir = tempfile::tempdir().unwrap();
        let results = write_json(dir.path(), "results.json", &results_fixture());
        let output = dir.path().join("out.json");

        let args = ExportArgs {
            results,
            rubric: None,
            fields: None,
            job_id: Some("job-42".to_string()),
            output: output.clone(),
        };
        cmd_export(ExportFormat::Json, args).unwrap();

        let doc: Value = read_json_file(&output).unwrap();
        assert_eq!(doc["format_version"], "2.0");
        assert_eq!(doc["metadata"]["job_id"], "job-42");
        assert_eq!(doc["metadata"]["total_results"], 1);
    }

    #[test]
    fn test_export_rejects_unknown_field() {
        let dir = tempfile::tempdir().unwrap();
        let results = write_json(dir.path(), "results.json", &results_fixture());
        let output = dir.path().join("out.csv");

        let args = ExportArgs {
            results,
            rubric: None,
            fields: Some(vec!["not_a_field".to_string()]),
            job_id: None,
            output: output.clone(),
        };
        let err = cmd_export(ExportFormat::Csv, args).unwrap_err();
        assert!(err.to_string().contains("not_a_field"));
        assert!(!output.exists());
    }

    #[test]
    fn test_checkpoint_jsonld_roundtrip_via_commands() {
        let dir = tempfile::tempdir().unwrap();
        let native = write_json(dir.path(), "bench.json", &checkpoint_fixture());
        let jsonld = dir.path().join("bench.jsonld");
        let back = dir.path().join("back.json");

        cmd_to_jsonld(&native, &jsonld).unwrap();
        cmd_checkpoint_validate(&jsonld).unwrap();
        cmd_from_jsonld(&jsonld, &back).unwrap();

        let original = read_checkpoint_file(&native).unwrap();
        let restored = read_checkpoint_file(&back).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_validate_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            dir.path(),
            "broken.jsonld",
            &json!({ "@type": "Dataset", "dataFeedElement": {} }),
        );
        let err = cmd_checkpoint_validate(&path).unwrap_err();
        assert!(err.to_string().contains("failed validation"));
    }

    #[test]
    fn test_read_json_file_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = read_json_file::<Value>(&path).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn test_cli_parses_export_fields_list() {
        let cli = Cli::try_parse_from([
            "karenina",
            "export",
            "csv",
            "-r",
            "results.json",
            "--fields",
            "question_id,success",
            "-o",
            "out.csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Export {
                action: ExportAction::Csv(args),
            } => {
                assert_eq!(args.results, PathBuf::from("results.json"));
                assert_eq!(
                    args.fields,
                    Some(vec!["question_id".to_string(), "success".to_string()])
                );
            }
            _ => panic!("expected export csv command"),
        }
    }

    #[test]
    fn test_global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "karenina",
            "verify",
            "status",
            "job-1",
            "--api-url",
            "http://karenina.internal:8080",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.api_url.as_deref(), Some("http://karenina.internal:8080"));
        assert!(matches!(
            cli.command,
            Commands::Verify {
                action: VerifyAction::Status { .. }
            }
        ));
    }
}
