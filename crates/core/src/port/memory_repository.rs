// In-memory JobRepository (reference implementation)
//
// Volatile: every record is lost when the process exits.

use crate::domain::{Job, JobId, JobPatch, JobStatus};
use crate::error::{AppError, Result};
use crate::port::job_repository::{JobRepository, UpdateOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Records {
    jobs: HashMap<JobId, Job>,
    // Insertion order, used to break created_at ties
    order: Vec<JobId>,
}

/// JobRepository backed by a HashMap behind an async RwLock
#[derive(Default)]
pub struct InMemoryJobRepository {
    records: RwLock<Records>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn ordered(records: &Records, filter: impl Fn(&Job) -> bool) -> Vec<Job> {
        let mut jobs: Vec<Job> = records
            .order
            .iter()
            .filter_map(|id| records.jobs.get(id))
            .filter(|job| filter(job))
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        let mut records = self.records.write().await;
        if records.jobs.contains_key(&job.id) {
            return Err(AppError::Database(format!(
                "Unique constraint violation: job {} already exists",
                job.id
            )));
        }
        records.order.push(job.id.clone());
        records.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        Ok(self.records.read().await.jobs.get(id).cloned())
    }

    async fn update(&self, id: &JobId, patch: &JobPatch) -> Result<UpdateOutcome> {
        let mut records = self.records.write().await;
        let Some(job) = records.jobs.get_mut(id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        if !patch.precondition.holds(job) {
            return Ok(UpdateOutcome::Rejected(job.clone()));
        }

        job.apply(patch)?;
        Ok(UpdateOutcome::Applied(job.clone()))
    }

    async fn list(&self) -> Result<Vec<Job>> {
        let records = self.records.read().await;
        Ok(Self::ordered(&records, |_| true))
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let records = self.records.read().await;
        Ok(Self::ordered(&records, |job| job.status == status))
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let records = self.records.read().await;
        Ok(records.jobs.values().filter(|j| j.status == status).count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobMetrics, StyleOptions};

    fn job_at(id: &str, created_at: i64) -> Job {
        Job::new(
            id,
            created_at,
            "in.mp4",
            None,
            Some("vibrant".to_string()),
            StyleOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = InMemoryJobRepository::new();
        let job = job_at("a", 1);
        repo.insert(&job).await.unwrap();

        assert_eq!(repo.find_by_id(&"a".to_string()).await.unwrap(), Some(job));
        assert_eq!(repo.find_by_id(&"b".to_string()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let repo = InMemoryJobRepository::new();
        repo.insert(&job_at("a", 1)).await.unwrap();
        assert!(matches!(
            repo.insert(&job_at("a", 2)).await,
            Err(AppError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_list_orders_by_creation_not_update() {
        let repo = InMemoryJobRepository::new();
        repo.insert(&job_at("late", 300)).await.unwrap();
        repo.insert(&job_at("early", 100)).await.unwrap();
        repo.insert(&job_at("tie", 300)).await.unwrap();

        // Touch the earliest job last
        let outcome = repo
            .update(&"early".to_string(), &JobPatch::start(999))
            .await
            .unwrap();
        assert!(outcome.is_applied());

        let ids: Vec<String> = repo.list().await.unwrap().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["early", "late", "tie"]);
    }

    #[tokio::test]
    async fn test_guarded_update() {
        let repo = InMemoryJobRepository::new();
        let id = "a".to_string();
        repo.insert(&job_at("a", 1)).await.unwrap();

        // Progress on a Pending job is rejected
        let outcome = repo.update(&id, &JobPatch::progress(10, 2)).await.unwrap();
        assert!(matches!(outcome, UpdateOutcome::Rejected(_)));

        assert!(repo.update(&id, &JobPatch::start(3)).await.unwrap().is_applied());
        // Second claim loses
        assert!(!repo.update(&id, &JobPatch::start(4)).await.unwrap().is_applied());

        let done = repo
            .update(&id, &JobPatch::complete("out.mp4", JobMetrics::new("0:12", 77u32, 512u32, "3MB"), 5))
            .await
            .unwrap();
        let UpdateOutcome::Applied(job) = done else {
            panic!("completion should apply");
        };
        assert_eq!(job.status, JobStatus::Completed);

        // Terminal: cancellation is rejected and nothing changes
        let outcome = repo.update(&id, &JobPatch::cancel("x", 6)).await.unwrap();
        assert!(matches!(outcome, UpdateOutcome::Rejected(ref j) if j.updated_at == 5));

        let outcome = repo
            .update(&"missing".to_string(), &JobPatch::start(7))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_count_and_find_by_status() {
        let repo = InMemoryJobRepository::new();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            repo.insert(&job_at(id, i as i64)).await.unwrap();
        }
        repo.update(&"b".to_string(), &JobPatch::start(10)).await.unwrap();

        assert_eq!(repo.count_by_status(JobStatus::Pending).await.unwrap(), 2);
        assert_eq!(repo.count_by_status(JobStatus::Processing).await.unwrap(), 1);
        let processing = repo.find_by_status(JobStatus::Processing).await.unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, "b");
    }
}
