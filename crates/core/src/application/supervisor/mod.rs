// Worker Supervisor - one external worker per job

pub mod constants;
mod error_buffer;

use constants::*;
pub use error_buffer::ErrorBuffer;

use crate::domain::{parse_line, Job, JobId, JobMetrics, WorkerEvent};
use crate::error::Result;
use crate::port::{CancelToken, WorkerInvocation, WorkerLauncher, WorkerSignal};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Transitions the supervisor may request. Implemented by the orchestrator,
/// which is the only writer of job records.
///
/// Each method returns whether the transition was applied; a `false` means
/// the store rejected it (stale progress, job already terminal).
#[async_trait]
pub trait JobTransitions: Send + Sync {
    async fn apply_progress(&self, id: &JobId, percent: u8) -> Result<bool>;

    async fn apply_completion(
        &self,
        id: &JobId,
        output_path: &str,
        metrics: JobMetrics,
    ) -> Result<bool>;

    async fn apply_failure(&self, id: &JobId, message: &str) -> Result<bool>;
}

/// How a supervision run ended
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisionOutcome {
    Completed,
    Failed(String),
    /// Cancelled by the caller; the job record was already marked Failed
    Cancelled,
}

/// Effect of one stdout line on the job's completion
enum LineEffect {
    None,
    /// A valid metrics event reached the store
    Completed,
    /// A valid metrics event could not be recorded
    CompletionFailed(String),
}

/// Runs a worker and translates its output into job transitions
pub struct WorkerSupervisor {
    launcher: Arc<dyn WorkerLauncher>,
    error_buffer_limit: usize,
}

impl WorkerSupervisor {
    pub fn new(launcher: Arc<dyn WorkerLauncher>) -> Self {
        Self {
            launcher,
            error_buffer_limit: DEFAULT_ERROR_BUFFER_LIMIT,
        }
    }

    pub fn with_error_buffer_limit(mut self, limit: usize) -> Self {
        self.error_buffer_limit = limit;
        self
    }

    /// Supervise the worker for `job` until it exits.
    ///
    /// Meant to run on its own task; never returns an error; failures are
    /// recorded on the job through `transitions`.
    pub async fn run(
        &self,
        job: &Job,
        output_path: &str,
        transitions: &dyn JobTransitions,
        cancel: CancelToken,
    ) -> SupervisionOutcome {
        if cancel.is_cancelled() {
            info!(job_id = %job.id, "Job cancelled before worker launch");
            return SupervisionOutcome::Cancelled;
        }

        let launched = match WorkerInvocation::for_job(job, output_path) {
            Ok(invocation) => {
                info!(job_id = %job.id, args = ?invocation.args, "Launching worker");
                self.launcher.launch(&invocation, cancel.clone()).await
            }
            Err(e) => Err(e),
        };

        let mut signals = match launched {
            Ok(rx) => rx,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Worker launch failed");
                let message = format!("{}: {}", LAUNCH_FAILED_MESSAGE, e);
                return self.fail(transitions, &job.id, message).await;
            }
        };

        let mut stderr = ErrorBuffer::new(self.error_buffer_limit);
        let mut saw_metrics = false;
        let mut completion_error: Option<String> = None;

        // Some(code) once the worker reported its exit, None if the stream broke
        let exit = loop {
            match signals.recv().await {
                Some(WorkerSignal::Stdout(line)) => {
                    match self
                        .handle_stdout(job, output_path, transitions, &line)
                        .await
                    {
                        LineEffect::None => {}
                        LineEffect::Completed => saw_metrics = true,
                        LineEffect::CompletionFailed(message) => {
                            completion_error = Some(message)
                        }
                    }
                }
                Some(WorkerSignal::Stderr(line)) => {
                    debug!(job_id = %job.id, line = %line, "Worker stderr");
                    stderr.push(&line);
                }
                Some(WorkerSignal::Exited(code)) => break Some(code),
                None => break None,
            }
        };

        if cancel.is_cancelled() {
            info!(job_id = %job.id, exit = ?exit, "Cancelled worker stopped");
            return SupervisionOutcome::Cancelled;
        }

        let message = match exit {
            Some(Some(SUCCESS_EXIT_CODE)) if saw_metrics => {
                info!(job_id = %job.id, "Worker completed successfully");
                return SupervisionOutcome::Completed;
            }
            Some(Some(SUCCESS_EXIT_CODE)) => match completion_error {
                Some(message) => message,
                None => with_diagnostics(MISSING_METRICS_MESSAGE, &stderr),
            },
            Some(Some(code)) => {
                with_diagnostics(&format!("Worker exited with code {}", code), &stderr)
            }
            Some(None) => with_diagnostics(SIGNAL_TERMINATED_MESSAGE, &stderr),
            None => with_diagnostics(STREAM_CLOSED_MESSAGE, &stderr),
        };

        error!(job_id = %job.id, exit = ?exit, error = %message, "Worker failed");
        self.fail(transitions, &job.id, message).await
    }

    async fn handle_stdout(
        &self,
        job: &Job,
        output_path: &str,
        transitions: &dyn JobTransitions,
        line: &str,
    ) -> LineEffect {
        match parse_line(line) {
            Ok(WorkerEvent::Progress(percent)) => {
                match transitions.apply_progress(&job.id, percent).await {
                    Ok(true) => debug!(job_id = %job.id, progress = percent, "Progress updated"),
                    Ok(false) => {
                        debug!(job_id = %job.id, progress = percent, "Dropped stale progress")
                    }
                    Err(e) => error!(job_id = %job.id, error = %e, "Failed to record progress"),
                }
                LineEffect::None
            }
            Ok(WorkerEvent::Metrics(metrics)) => {
                match transitions
                    .apply_completion(&job.id, output_path, metrics)
                    .await
                {
                    Ok(true) => {
                        info!(job_id = %job.id, output_path = %output_path, "Job completed");
                        LineEffect::Completed
                    }
                    Ok(false) => {
                        warn!(job_id = %job.id, "Metrics arrived for a job that is no longer processing");
                        LineEffect::Completed
                    }
                    Err(e) => {
                        error!(job_id = %job.id, error = %e, "Failed to record completion");
                        LineEffect::CompletionFailed(format!(
                            "{}: {}",
                            COMPLETION_NOT_RECORDED_MESSAGE, e
                        ))
                    }
                }
            }
            Ok(WorkerEvent::Log) => {
                debug!(job_id = %job.id, line = %line, "Worker output");
                LineEffect::None
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Ignoring malformed worker metrics");
                LineEffect::None
            }
        }
    }

    async fn fail(
        &self,
        transitions: &dyn JobTransitions,
        id: &JobId,
        message: String,
    ) -> SupervisionOutcome {
        match transitions.apply_failure(id, &message).await {
            Ok(true) => {}
            Ok(false) => debug!(job_id = %id, "Failure not recorded, job already terminal"),
            Err(e) => error!(job_id = %id, error = %e, "Failed to record job failure"),
        }
        SupervisionOutcome::Failed(message)
    }
}

fn with_diagnostics(summary: &str, stderr: &ErrorBuffer) -> String {
    if stderr.is_empty() {
        summary.to_string()
    } else {
        format!("{}: {}", summary, stderr.contents())
    }
}
