// Job Orchestrator - public face of the engine
//
// Owns the job store handle and the per-job cancel handles. Supervision
// tasks report back exclusively through the `JobTransitions` impl below.

pub mod create;

pub use create::{validate_request, CreateJobRequest, ValidatedRequest};

use crate::application::supervisor::constants::SUPERVISION_PANICKED_MESSAGE;
use crate::application::supervisor::{JobTransitions, WorkerSupervisor};
use crate::domain::{Job, JobId, JobMetrics, JobPatch};
use crate::error::{AppError, Result};
use crate::port::{
    cancel_channel, CancelHandle, IdProvider, JobRepository, TimeProvider, UpdateOutcome,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Failure message recorded when a caller cancels a job
pub const CANCELLED_MESSAGE: &str = "Job cancelled by user";

pub struct JobOrchestrator {
    job_repo: Arc<dyn JobRepository>,
    supervisor: WorkerSupervisor,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    output_dir: PathBuf,
    running: Mutex<HashMap<JobId, CancelHandle>>,
}

impl JobOrchestrator {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        supervisor: WorkerSupervisor,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            job_repo,
            supervisor,
            id_provider,
            time_provider,
            output_dir: output_dir.into(),
            running: Mutex::new(HashMap::new()),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Destination the worker writes to: `<output_dir>/output_<id>.mp4`
    pub fn output_path_for(&self, id: &JobId) -> String {
        self.output_dir
            .join(format!("output_{}.mp4", id))
            .to_string_lossy()
            .into_owned()
    }

    /// Validate and persist a Pending job without starting it
    pub async fn create_job(&self, req: CreateJobRequest) -> Result<Job> {
        let job = create::execute(
            self.job_repo.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            req,
        )
        .await?;

        info!(
            job_id = %job.id,
            input_path = %job.input_path,
            style_template = ?job.style_template,
            "Job created"
        );
        Ok(job)
    }

    /// Claim a Pending job and hand it to a background supervision task.
    ///
    /// Returns `Ok(false)` when the job is not Pending (already claimed,
    /// cancelled or finished).
    ///
    /// # Errors
    /// - AppError::NotFound if no job has this ID
    pub async fn start_processing(self: &Arc<Self>, id: &JobId) -> Result<bool> {
        let (handle, token) = cancel_channel();
        {
            let mut running = self.lock_running();
            if running.contains_key(id) {
                debug!(job_id = %id, "Job already being supervised");
                return Ok(false);
            }
            running.insert(id.clone(), handle);
        }

        let claimed = self
            .job_repo
            .update(id, &JobPatch::start(self.time_provider.now_millis()))
            .await;

        let job = match claimed {
            Ok(UpdateOutcome::Applied(job)) => job,
            Ok(UpdateOutcome::Rejected(job)) => {
                self.lock_running().remove(id);
                debug!(job_id = %id, status = %job.status, "Claim rejected");
                return Ok(false);
            }
            Ok(UpdateOutcome::NotFound) => {
                self.lock_running().remove(id);
                return Err(AppError::job_not_found(id));
            }
            Err(e) => {
                self.lock_running().remove(id);
                return Err(e);
            }
        };

        info!(job_id = %job.id, "Job claimed, starting supervision");

        let output_path = self.output_path_for(&job.id);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let job_id = job.id.clone();

            // Inner task so a panic surfaces as a JoinError instead of
            // leaving the job stuck in Processing
            let supervision = {
                let this = Arc::clone(&this);
                tokio::spawn(async move {
                    this.supervisor
                        .run(&job, &output_path, this.as_ref(), token)
                        .await
                })
            };

            match supervision.await {
                Ok(outcome) => debug!(job_id = %job_id, outcome = ?outcome, "Supervision finished"),
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Supervision task aborted");
                    if let Err(e) = this
                        .apply_failure(&job_id, SUPERVISION_PANICKED_MESSAGE)
                        .await
                    {
                        error!(job_id = %job_id, error = %e, "Failed to record supervision failure");
                    }
                }
            }

            this.lock_running().remove(&job_id);
        });

        Ok(true)
    }

    /// Create a job and immediately start it
    pub async fn create_and_start(self: &Arc<Self>, req: CreateJobRequest) -> Result<Job> {
        let job = self.create_job(req).await?;
        self.start_processing(&job.id).await?;
        self.get_job(&job.id).await
    }

    /// # Errors
    /// - AppError::NotFound if no job has this ID
    pub async fn get_job(&self, id: &JobId) -> Result<Job> {
        self.job_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::job_not_found(id))
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.job_repo.list().await
    }

    /// Fail a Pending or Processing job and stop its worker.
    ///
    /// Returns `false` if the job does not exist or is already terminal.
    pub async fn cancel_job(&self, id: &JobId) -> Result<bool> {
        let patch = JobPatch::cancel(CANCELLED_MESSAGE, self.time_provider.now_millis());

        match self.job_repo.update(id, &patch).await? {
            UpdateOutcome::Applied(job) => {
                if let Some(handle) = self.lock_running().get(id) {
                    handle.cancel();
                }
                info!(job_id = %id, progress = job.progress, "Job cancelled");
                Ok(true)
            }
            UpdateOutcome::Rejected(job) => {
                debug!(job_id = %id, status = %job.status, "Cancel ignored, job already terminal");
                Ok(false)
            }
            UpdateOutcome::NotFound => {
                debug!(job_id = %id, "Cancel ignored, job not found");
                Ok(false)
            }
        }
    }

    /// Whether a supervision task currently owns this job
    pub fn is_supervising(&self, id: &JobId) -> bool {
        self.lock_running().contains_key(id)
    }

    pub fn active_workers(&self) -> usize {
        self.lock_running().len()
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, CancelHandle>> {
        // Poisoning only follows a panic while holding the lock; the map stays usable
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl JobTransitions for JobOrchestrator {
    async fn apply_progress(&self, id: &JobId, percent: u8) -> Result<bool> {
        let patch = JobPatch::progress(percent, self.time_provider.now_millis());
        Ok(self.job_repo.update(id, &patch).await?.is_applied())
    }

    async fn apply_completion(
        &self,
        id: &JobId,
        output_path: &str,
        metrics: JobMetrics,
    ) -> Result<bool> {
        let patch = JobPatch::complete(output_path, metrics, self.time_provider.now_millis());
        Ok(self.job_repo.update(id, &patch).await?.is_applied())
    }

    async fn apply_failure(&self, id: &JobId, message: &str) -> Result<bool> {
        let patch = JobPatch::fail(message, self.time_provider.now_millis());
        let outcome = self.job_repo.update(id, &patch).await?;
        if let UpdateOutcome::Rejected(job) = &outcome {
            warn!(job_id = %id, status = %job.status, "Failure dropped, job not processing");
        }
        Ok(outcome.is_applied())
    }
}
