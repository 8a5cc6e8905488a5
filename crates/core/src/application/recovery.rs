// Startup reconciliation
use crate::domain::{JobPatch, JobStatus};
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

/// Failure message for jobs whose supervisor died with a previous process
pub const SUPERVISION_LOST_MESSAGE: &str = "Worker supervision lost: engine restarted";

/// Startup reconciliation service
///
/// Supervision tasks do not survive a restart, so any job still marked
/// Processing when the engine boots can never finish. They are failed
/// before the engine accepts requests.
pub struct RecoveryService {
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RecoveryService {
    pub fn new(job_repo: Arc<dyn JobRepository>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            job_repo,
            time_provider,
        }
    }

    /// Mark every Processing job as Failed
    ///
    /// # Returns
    /// Number of jobs recovered
    pub async fn fail_orphaned_jobs(&self) -> crate::error::Result<usize> {
        let orphaned = self.job_repo.find_by_status(JobStatus::Processing).await?;
        if orphaned.is_empty() {
            return Ok(0);
        }

        info!(count = orphaned.len(), "Recovering orphaned jobs");

        let mut recovered_count = 0;
        for job in orphaned {
            let patch = JobPatch::fail(SUPERVISION_LOST_MESSAGE, self.time_provider.now_millis());
            if self.job_repo.update(&job.id, &patch).await?.is_applied() {
                warn!(
                    job_id = %job.id,
                    progress = job.progress,
                    "Orphaned job marked as FAILED"
                );
                recovered_count += 1;
            }
        }

        info!(recovered_count = %recovered_count, "Orphaned job recovery complete");
        Ok(recovered_count)
    }
}
