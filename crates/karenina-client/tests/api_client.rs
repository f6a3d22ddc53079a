use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use karenina_client::{
    ClientConfig, ClientError, JobKind, JobOutcome, JobPoller, JobStatus, KareninaClient,
    McpController, CSRF_HEADER,
};
use karenina_core::mcp::{McpServerStatus, ValidationOutcome};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, Mutex};

#[derive(Debug, Clone)]
struct TestServerState {
    progress: Arc<Mutex<VecDeque<Value>>>,
    tokens_issued: Arc<Mutex<u32>>,
    reject_first_token: bool,
    seen_csrf_headers: Arc<Mutex<Vec<String>>>,
    cancelled_jobs: Arc<Mutex<Vec<String>>>,
}

impl TestServerState {
    fn new() -> Self {
        Self {
            progress: Arc::new(Mutex::new(VecDeque::new())),
            tokens_issued: Arc::new(Mutex::new(0)),
            reject_first_token: false,
            seen_csrf_headers: Arc::new(Mutex::new(Vec::new())),
            cancelled_jobs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_progress(statuses: &[(&str, u64)]) -> Self {
        let state = Self::new();
        let snapshots = statuses
            .iter()
            .map(|(status, done)| {
                json!({
                    "job_id": "job-1",
                    "status": status,
                    "percentage": *done as f64 * 50.0,
                    "processed_count": done,
                    "total_count": 2,
                })
            })
            .collect();
        *state.progress.try_lock().expect("fresh state") = snapshots;
        state
    }
}

async fn spawn_test_server(
    state: TestServerState,
) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/csrf-token", get(csrf_handler))
        .route("/api/v2/verifications", post(start_handler))
        .route("/api/v2/verifications/:id/progress", get(progress_handler))
        .route("/api/v2/verifications/:id/cancel", post(cancel_handler))
        .route("/api/v2/verifications/:id/results", get(results_handler))
        .route("/api/v2/benchmarks", get(malformed_handler))
        .route("/api/v2/mcp/validate", post(validate_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        server.await.expect("test server should run");
    });

    (format!("http://{local_addr}"), shutdown_tx, server_task)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "version": "0.9.1" }))
}

async fn csrf_handler(State(state): State<TestServerState>) -> Json<Value> {
    let mut issued = state.tokens_issued.lock().await;
    *issued += 1;
    Json(json!({ "token": format!("tok-{issued}") }))
}

async fn start_handler(
    State(state): State<TestServerState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let token = headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.seen_csrf_headers.lock().await.push(token.clone());

    if token.is_empty() || (state.reject_first_token && token == "tok-1") {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "detail": "CSRF token invalid" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "job_id": "job-1", "status": "pending" })),
    )
}

async fn progress_handler(
    State(state): State<TestServerState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    if id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Job not found" })),
        );
    }
    let mut queue = state.progress.lock().await;
    let snapshot = if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    };
    let body = snapshot.unwrap_or_else(|| json!({ "job_id": id, "status": "running" }));
    (StatusCode::OK, Json(body))
}

async fn cancel_handler(
    State(state): State<TestServerState>,
    Path(id): Path<String>,
) -> Json<Value> {
    state.cancelled_jobs.lock().await.push(id);
    Json(json!({ "success": true }))
}

async fn results_handler(Path(id): Path<String>) -> Json<Value> {
    Json(json!({
        "results": {
            "r2": { "metadata": { "question_id": "q2", "job_id": id, "completed_without_errors": true } },
            "r1": { "metadata": { "question_id": "q1", "job_id": id, "completed_without_errors": false, "error": "timeout" } }
        }
    }))
}

async fn malformed_handler() -> Json<Value> {
    Json(json!({ "items": [] }))
}

async fn validate_handler(Json(payload): Json<Value>) -> Json<Value> {
    let url = payload["server_url"].as_str().unwrap_or_default();
    if url.contains("down") {
        Json(json!({ "success": false, "error": "connection timed out" }))
    } else {
        Json(json!({
            "success": true,
            "tools": ["web_search", { "name": "fetch_page", "description": "Fetch a URL" }]
        }))
    }
}

fn client_for(url: &str) -> KareninaClient {
    let mut config = ClientConfig::new(url);
    config.poll_interval_ms = 10;
    KareninaClient::new(config).expect("client should build")
}

fn verification_request() -> karenina_client::VerificationRequest {
    serde_json::from_value(json!({
        "config": { "answering_models": [], "parsing_models": [] },
        "finished_templates": []
    }))
    .expect("request should deserialize")
}

#[tokio::test]
async fn health_reports_status_and_extra_fields() {
    let (url, shutdown_tx, server_task) = spawn_test_server(TestServerState::new()).await;

    let health = client_for(&url).health().await.expect("health should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(health.is_healthy());
    assert_eq!(health.extra["version"], "0.9.1");
}

#[tokio::test]
async fn mutating_requests_send_cached_csrf_token() {
    let state = TestServerState::new();
    let (url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;
    let client = client_for(&url);

    let first = client
        .start_verification(&verification_request())
        .await
        .expect("start should succeed");
    client
        .start_verification(&verification_request())
        .await
        .expect("second start should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(first.job_id, "job-1");
    assert_eq!(first.status, Some(JobStatus::Pending));
    assert_eq!(*state.tokens_issued.lock().await, 1);
    assert_eq!(
        *state.seen_csrf_headers.lock().await,
        vec!["tok-1".to_string(), "tok-1".to_string()]
    );
}

#[tokio::test]
async fn forbidden_response_refreshes_csrf_token_once() {
    let mut state = TestServerState::new();
    state.reject_first_token = true;
    let (url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let started = client_for(&url)
        .start_verification(&verification_request())
        .await
        .expect("start should succeed after refresh");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(started.job_id, "job-1");
    assert_eq!(
        *state.seen_csrf_headers.lock().await,
        vec!["tok-1".to_string(), "tok-2".to_string()]
    );
}

#[tokio::test]
async fn api_error_carries_detail_message() {
    let (url, shutdown_tx, server_task) = spawn_test_server(TestServerState::new()).await;

    let err = client_for(&url)
        .verification_progress("missing")
        .await
        .expect_err("missing job should fail");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "backend returned 404: Job not found");
}

#[tokio::test]
async fn unexpected_body_is_a_decode_error() {
    let (url, shutdown_tx, server_task) = spawn_test_server(TestServerState::new()).await;

    let err = client_for(&url)
        .list_benchmarks("sqlite:///dbs/karenina.db")
        .await
        .expect_err("body without `benchmarks` should fail");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    match err {
        ClientError::Decode { endpoint, .. } => assert_eq!(endpoint, "/api/v2/benchmarks"),
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[tokio::test]
async fn keyed_results_are_returned_in_key_order() {
    let (url, shutdown_tx, server_task) = spawn_test_server(TestServerState::new()).await;

    let results = client_for(&url)
        .verification_results("job-1")
        .await
        .expect("results should load");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    let ids: Vec<&str> = results
        .iter()
        .map(|r| r.metadata.question_id.as_str())
        .collect();
    assert_eq!(ids, vec!["q1", "q2"]);
    assert_eq!(results[0].metadata.error.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn poller_follows_job_to_completion() {
    let state = TestServerState::with_progress(&[("pending", 0), ("running", 1), ("completed", 2)]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;
    let client = client_for(&url);

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let mut handle = JobPoller::new(client).watch(JobKind::Verification, "job-1", move |p| {
        let _ = seen_tx.send(p.status);
    });
    let outcome = handle.wait().await.expect("poll should finish");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    let mut seen = Vec::new();
    while let Ok(status) = seen_rx.try_recv() {
        seen.push(status);
    }
    assert_eq!(
        seen,
        vec![JobStatus::Pending, JobStatus::Running, JobStatus::Completed]
    );
    match outcome {
        JobOutcome::Finished(progress) => {
            assert_eq!(progress.processed_count, 2);
            assert_eq!(progress.total_count, 2);
        }
        JobOutcome::Cancelled => panic!("job should have finished"),
    }
}

#[tokio::test]
async fn waiting_again_after_completion_returns_same_outcome() {
    let state = TestServerState::with_progress(&[("completed", 2)]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;
    let client = client_for(&url);

    let mut handle = JobPoller::new(client).watch(JobKind::Verification, "job-1", |_| {});
    let first = handle.wait().await.expect("poll should finish");
    let second = handle.wait().await.expect("second wait should reuse the outcome");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(matches!(first, JobOutcome::Finished(_)));
    assert_eq!(first, second);
}

#[tokio::test]
async fn cancel_stops_polling_and_notifies_backend() {
    let state = TestServerState::with_progress(&[("running", 1)]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;
    let client = client_for(&url);

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let mut handle = JobPoller::new(client)
        .with_interval(Duration::from_millis(5))
        .watch(JobKind::Verification, "job-1", move |p| {
            let _ = seen_tx.send(p.status);
        });
    seen_rx.recv().await.expect("at least one progress update");

    handle.cancel().await.expect("cancel should succeed");
    let outcome = handle.wait().await.expect("poll should stop");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(outcome, JobOutcome::Cancelled);
    assert_eq!(*state.cancelled_jobs.lock().await, vec!["job-1".to_string()]);
}

#[tokio::test]
async fn mcp_validation_maps_success_and_failure() {
    let (url, shutdown_tx, server_task) = spawn_test_server(TestServerState::new()).await;
    let client = client_for(&url);

    let ok = client
        .validate_mcp_server("search", "https://mcp.example.org/search")
        .await
        .expect("validation request should succeed");
    let failed = client
        .validate_mcp_server("flaky", "https://down.example.org/mcp")
        .await
        .expect("failed validation is still a response");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    match ok {
        ValidationOutcome::Valid { tools } => {
            let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
            assert_eq!(names, vec!["web_search", "fetch_page"]);
            assert_eq!(tools[1].description.as_deref(), Some("Fetch a URL"));
        }
        other => panic!("expected valid outcome, got {other:?}"),
    }
    assert_eq!(
        failed,
        ValidationOutcome::Invalid {
            error: "connection timed out".to_string()
        }
    );
}

#[tokio::test]
async fn controller_validates_all_servers_against_backend() {
    let (url, shutdown_tx, server_task) = spawn_test_server(TestServerState::new()).await;
    let mut controller = McpController::new(client_for(&url), false);
    controller
        .state_mut()
        .add_server("search", "https://mcp.example.org/search")
        .expect("server should be added");
    controller
        .state_mut()
        .add_server("flaky", "https://down.example.org/mcp")
        .expect("server should be added");

    let applied = controller
        .validate_all()
        .await
        .expect("validation should run");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(applied.len(), 2);
    let state = controller.state();
    assert_eq!(
        state.server("search").map(|s| s.status),
        Some(McpServerStatus::Valid)
    );
    assert_eq!(
        state.server("flaky").map(|s| s.status),
        Some(McpServerStatus::Invalid)
    );
    let config = state.to_configuration();
    assert_eq!(config.servers.len(), 2);
    assert_eq!(
        config.tools,
        vec!["fetch_page".to_string(), "web_search".to_string()]
    );
}
