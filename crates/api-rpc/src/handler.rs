//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC params to `JobOrchestrator` calls.

use crate::error::to_rpc_error;
use crate::types::{
    CancelJobResponse, CreateJobParams, JobIdParams, ListJobsParams, ListJobsResponse,
    StartJobResponse, StatsResponse, TemplatesResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use restyle_core::application::{CreateJobRequest, JobOrchestrator};
use restyle_core::domain::{Job, JobStatus, StyleTemplateCatalog};
use restyle_core::port::JobRepository;
use std::sync::Arc;
use tracing::info;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    orchestrator: Arc<JobOrchestrator>,
    job_repo: Arc<dyn JobRepository>,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(orchestrator: Arc<JobOrchestrator>, job_repo: Arc<dyn JobRepository>) -> Self {
        Self {
            orchestrator,
            job_repo,
            start_time: std::time::Instant::now(),
        }
    }

    /// job.create.v1
    pub async fn create_job(&self, params: CreateJobParams) -> Result<Job, ErrorObjectOwned> {
        let req = CreateJobRequest {
            input_path: params.input_path,
            reference_path: params.reference_path,
            style_template: params.style_template,
            options: params.options,
        };

        let job = if params.start {
            self.orchestrator.create_and_start(req).await
        } else {
            self.orchestrator.create_job(req).await
        }
        .map_err(to_rpc_error)?;

        info!(job_id = %job.id, started = params.start, "job.create.v1");
        Ok(job)
    }

    /// job.start.v1
    pub async fn start_job(&self, params: JobIdParams) -> Result<StartJobResponse, ErrorObjectOwned> {
        let started = self
            .orchestrator
            .start_processing(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(StartJobResponse {
            job_id: params.job_id,
            started,
        })
    }

    /// job.get.v1
    pub async fn get_job(&self, params: JobIdParams) -> Result<Job, ErrorObjectOwned> {
        self.orchestrator
            .get_job(&params.job_id)
            .await
            .map_err(to_rpc_error)
    }

    /// job.list.v1
    pub async fn list_jobs(
        &self,
        params: ListJobsParams,
    ) -> Result<ListJobsResponse, ErrorObjectOwned> {
        let jobs = match params.status {
            Some(status) => self.job_repo.find_by_status(status).await,
            None => self.orchestrator.list_jobs().await,
        }
        .map_err(to_rpc_error)?;

        Ok(ListJobsResponse { jobs })
    }

    /// job.cancel.v1
    pub async fn cancel_job(
        &self,
        params: JobIdParams,
    ) -> Result<CancelJobResponse, ErrorObjectOwned> {
        let cancelled = self
            .orchestrator
            .cancel_job(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(CancelJobResponse {
            job_id: params.job_id,
            cancelled,
        })
    }

    /// templates.list.v1
    pub fn list_templates(&self) -> TemplatesResponse {
        TemplatesResponse {
            templates: StyleTemplateCatalog.list().to_vec(),
        }
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> Result<StatsResponse, ErrorObjectOwned> {
        let mut counts = [0i64; 4];
        for (slot, status) in counts.iter_mut().zip(JobStatus::ALL) {
            *slot = self
                .job_repo
                .count_by_status(status)
                .await
                .map_err(to_rpc_error)?;
        }
        let [pending, processing, completed, failed] = counts;

        Ok(StatsResponse {
            total_jobs: counts.iter().sum(),
            pending_jobs: pending,
            processing_jobs: processing,
            completed_jobs: completed,
            failed_jobs: failed,
            active_workers: self.orchestrator.active_workers(),
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        })
    }
}
