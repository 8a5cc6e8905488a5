//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use restyle_core::domain::{Job, JobStatus, StyleTemplate};
use serde::{Deserialize, Serialize};

/// job.create.v1 - Create a job, started immediately unless `start` is false
#[derive(Debug, Deserialize)]
pub struct CreateJobParams {
    pub input_path: String,
    #[serde(default)]
    pub reference_path: Option<String>,
    #[serde(default)]
    pub style_template: Option<String>,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
    #[serde(default = "default_start")]
    pub start: bool,
}

fn default_start() -> bool {
    true
}

/// Params of job.start.v1, job.get.v1 and job.cancel.v1
#[derive(Debug, Deserialize)]
pub struct JobIdParams {
    pub job_id: String,
}

/// job.start.v1
#[derive(Debug, Clone, Serialize)]
pub struct StartJobResponse {
    pub job_id: String,
    pub started: bool,
}

/// job.list.v1 - Optional status filter
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsParams {
    #[serde(default)]
    pub status: Option<JobStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
}

/// job.cancel.v1
#[derive(Debug, Clone, Serialize)]
pub struct CancelJobResponse {
    pub job_id: String,
    pub cancelled: bool,
}

/// templates.list.v1
#[derive(Debug, Clone, Serialize)]
pub struct TemplatesResponse {
    pub templates: Vec<StyleTemplate>,
}

/// admin.stats.v1 - Job counts by status
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_jobs: i64,
    pub pending_jobs: i64,
    pub processing_jobs: i64,
    pub completed_jobs: i64,
    pub failed_jobs: i64,
    pub active_workers: usize,
    pub uptime_seconds: i64,
}
