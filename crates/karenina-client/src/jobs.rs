//! Polling of long-running backend jobs with user cancellation.
//!
//! Cancelling fires the backend `cancel` call, then stops the poll loop.
//! A progress response still in flight at that point is discarded.

use std::time::Duration;

use karenina_core::obs;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::client::KareninaClient;
use crate::error::{ClientError, Result};
use crate::types::{JobKind, JobProgress};

/// How a watched job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The backend reported a terminal status.
    Finished(JobProgress),
    /// Polling was stopped by the user.
    Cancelled,
}

/// Spawns poll loops for backend jobs.
#[derive(Clone)]
pub struct JobPoller {
    client: KareninaClient,
    interval: Duration,
}

impl JobPoller {
    /// Poller using the client's configured poll interval.
    pub fn new(client: KareninaClient) -> Self {
        let interval = client.config().poll_interval();
        Self { client, interval }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start polling `job_id`; `on_progress` sees every snapshot.
    pub fn watch<F>(&self, kind: JobKind, job_id: &str, on_progress: F) -> JobHandle
    where
        F: FnMut(&JobProgress) + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let span = obs::job_span(kind.as_str(), job_id);
        let task = tokio::spawn(
            poll_loop(
                self.client.clone(),
                kind,
                job_id.to_string(),
                self.interval,
                cancel_rx,
                on_progress,
            )
            .instrument(span),
        );
        JobHandle {
            client: self.client.clone(),
            kind,
            job_id: job_id.to_string(),
            cancel_tx,
            state: LoopState::Running(task),
        }
    }
}

async fn poll_loop<F>(
    client: KareninaClient,
    kind: JobKind,
    job_id: String,
    interval: Duration,
    mut cancel_rx: watch::Receiver<bool>,
    mut on_progress: F,
) -> Result<JobOutcome>
where
    F: FnMut(&JobProgress) + Send + 'static,
{
    loop {
        let progress = tokio::select! {
            biased;
            _ = cancel_rx.changed() => return Ok(JobOutcome::Cancelled),
            progress = client.job_progress(kind, &job_id) => progress?,
        };
        if *cancel_rx.borrow() {
            return Ok(JobOutcome::Cancelled);
        }

        obs::emit_job_progress(
            &job_id,
            progress.status.as_str(),
            progress.processed_count,
            progress.total_count,
        );
        on_progress(&progress);
        if progress.status.is_terminal() {
            return Ok(JobOutcome::Finished(progress));
        }

        tokio::select! {
            biased;
            _ = cancel_rx.changed() => return Ok(JobOutcome::Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

enum LoopState {
    Running(JoinHandle<Result<JobOutcome>>),
    Ended(JobOutcome),
    Failed(String),
}

/// A job being polled in the background.
///
/// Dropping the handle closes the cancel channel, which ends the poll loop.
/// The job itself keeps running on the backend.
pub struct JobHandle {
    client: KareninaClient,
    kind: JobKind,
    job_id: String,
    cancel_tx: watch::Sender<bool>,
    state: LoopState,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Cancel the job on the backend, then stop polling.
    ///
    /// Polling stops even if the backend call fails; the error is returned.
    pub async fn cancel(&self) -> Result<()> {
        let result = self
            .client
            .cancel_job(self.kind, &self.job_id)
            .instrument(obs::job_span(self.kind.as_str(), &self.job_id))
            .await;
        self.cancel_tx.send_replace(true);
        result
    }

    /// Wait for the poll loop to end.
    ///
    /// Dropping this future before it resolves leaves the loop running, so
    /// a caller can race it against other events and wait again. Once the
    /// loop has ended, later calls return the same outcome.
    pub async fn wait(&mut self) -> Result<JobOutcome> {
        let task = match &mut self.state {
            LoopState::Running(task) => task,
            LoopState::Ended(outcome) => return Ok(outcome.clone()),
            LoopState::Failed(message) => return Err(ClientError::Http(message.clone())),
        };
        let result = match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(ClientError::Http(format!("poll task failed: {e}"))),
        };
        self.state = match &result {
            Ok(outcome) => LoopState::Ended(outcome.clone()),
            Err(err) => LoopState::Failed(err.to_string()),
        };
        result
    }
}
