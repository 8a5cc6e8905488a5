// Job Repository Port (Interface)

use crate::domain::{Job, JobId, JobPatch, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Result of a guarded update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Precondition held; carries the record after the write
    Applied(Job),
    /// Precondition failed; carries the unchanged record
    Rejected(Job),
    /// No job with that ID
    NotFound,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(_))
    }
}

/// Repository interface for Job persistence
///
/// Every `update` is a single atomic check-and-write keyed by job ID:
/// the patch precondition is evaluated against the stored record and the
/// write happens only if it holds.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Apply a partial update if its precondition holds
    async fn update(&self, id: &JobId, patch: &JobPatch) -> Result<UpdateOutcome>;

    /// All jobs, ordered by creation time ascending (insertion order breaks ties)
    async fn list(&self) -> Result<Vec<Job>>;

    /// Jobs in the given status, same ordering as `list`
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>>;

    /// Count jobs by status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;
}
