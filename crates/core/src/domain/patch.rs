// Partial job updates with store-side preconditions

use crate::domain::job::{Job, JobMetrics, JobStatus};

/// Condition the stored record must satisfy for a patch to be applied.
///
/// Stores evaluate it atomically together with the write, so two racing
/// writers can never both win a guarded transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Current status equals the given one (compare-and-swap)
    StatusIs(JobStatus),
    /// Job is Pending or Processing
    NotTerminal,
    /// Job is Processing and its recorded progress is strictly below the value
    ProgressBelow(u8),
}

impl Precondition {
    pub fn holds(&self, job: &Job) -> bool {
        match *self {
            Precondition::StatusIs(status) => job.status == status,
            Precondition::NotTerminal => !job.status.is_terminal(),
            Precondition::ProgressBelow(percent) => {
                job.status == JobStatus::Processing && job.progress < percent
            }
        }
    }
}

/// Partial update of a job record
#[derive(Debug, Clone, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub output_path: Option<String>,
    pub error_message: Option<String>,
    pub metrics: Option<JobMetrics>,
    pub updated_at: i64,
    pub precondition: Precondition,
}

impl JobPatch {
    fn empty(updated_at: i64, precondition: Precondition) -> Self {
        Self {
            status: None,
            progress: None,
            output_path: None,
            error_message: None,
            metrics: None,
            updated_at,
            precondition,
        }
    }

    /// Claim a Pending job for processing (progress reset to 0)
    pub fn start(now_millis: i64) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(0),
            ..Self::empty(now_millis, Precondition::StatusIs(JobStatus::Pending))
        }
    }

    /// Record progress; only applies when it moves forward
    pub fn progress(percent: u8, now_millis: i64) -> Self {
        Self {
            progress: Some(percent),
            ..Self::empty(now_millis, Precondition::ProgressBelow(percent))
        }
    }

    /// Processing -> Completed, freezing progress at 100
    pub fn complete(output_path: impl Into<String>, metrics: JobMetrics, now_millis: i64) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            output_path: Some(output_path.into()),
            metrics: Some(metrics),
            ..Self::empty(now_millis, Precondition::StatusIs(JobStatus::Processing))
        }
    }

    /// Processing -> Failed; progress is left as recorded
    pub fn fail(message: impl Into<String>, now_millis: i64) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_message: Some(message.into()),
            ..Self::empty(now_millis, Precondition::StatusIs(JobStatus::Processing))
        }
    }

    /// Pending | Processing -> Failed
    pub fn cancel(message: impl Into<String>, now_millis: i64) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_message: Some(message.into()),
            ..Self::empty(now_millis, Precondition::NotTerminal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processing_at(progress: u8) -> Job {
        let mut job = Job::new_test("in.mp4");
        job.status = JobStatus::Processing;
        job.progress = progress;
        job
    }

    #[test]
    fn test_progress_guard_requires_strict_increase() {
        let job = processing_at(40);
        assert!(!Precondition::ProgressBelow(40).holds(&job));
        assert!(!Precondition::ProgressBelow(30).holds(&job));
        assert!(Precondition::ProgressBelow(41).holds(&job));
    }

    #[test]
    fn test_progress_guard_requires_processing() {
        let mut job = processing_at(10);
        job.status = JobStatus::Failed;
        assert!(!Precondition::ProgressBelow(90).holds(&job));

        job.status = JobStatus::Pending;
        assert!(!Precondition::ProgressBelow(90).holds(&job));
    }

    #[test]
    fn test_not_terminal_guard() {
        let mut job = Job::new_test("in.mp4");
        assert!(Precondition::NotTerminal.holds(&job));
        job.status = JobStatus::Completed;
        assert!(!Precondition::NotTerminal.holds(&job));
    }

    #[test]
    fn test_complete_sets_outcome_fields() {
        let mut job = processing_at(95);
        let metrics = JobMetrics::new("1:30", 82u32, 1200u32, "12MB");
        job.apply(&JobPatch::complete("out.mp4", metrics.clone(), 42))
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.output_path.as_deref(), Some("out.mp4"));
        assert_eq!(job.metrics, Some(metrics));
        assert!(job.error_message.is_none());
        assert_eq!(job.updated_at, 42);
    }

    #[test]
    fn test_fail_keeps_progress() {
        let mut job = processing_at(55);
        job.apply(&JobPatch::fail("boom", 7)).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 55);
        assert_eq!(job.error_message.as_deref(), Some("boom"));
    }
}
