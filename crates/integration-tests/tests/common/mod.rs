//! Shared fixtures: SQLite-backed orchestrator driving `sh` workers

#![allow(dead_code)]

use restyle_core::application::{JobOrchestrator, WorkerSupervisor};
use restyle_core::domain::{Job, JobId};
use restyle_core::port::{JobRepository, SystemTimeProvider, UuidProvider};
use restyle_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};
use restyle_infra_system::SubprocessLauncher;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const POLL_INTERVAL: Duration = Duration::from_millis(20);
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn database_url(dir: &Path) -> String {
    format!("sqlite://{}", dir.join("jobs.db").display())
}

pub async fn open_pool(dir: &Path) -> SqlitePool {
    let pool = create_pool(&database_url(dir)).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// Write an executable-by-`sh` worker script into `dir`
pub fn write_worker(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

pub fn sh_launcher(script: &Path) -> SubprocessLauncher {
    SubprocessLauncher::new("sh")
        .with_script(script)
        .with_kill_grace(Duration::from_millis(500))
}

pub struct Engine {
    pub dir: TempDir,
    pub pool: SqlitePool,
    pub repo: Arc<dyn JobRepository>,
    pub orchestrator: Arc<JobOrchestrator>,
}

impl Engine {
    /// Engine whose worker is `sh <dir>/worker.sh`
    pub async fn with_worker(body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let script = write_worker(dir.path(), "worker.sh", body);
        let output_dir = dir.path().join("outputs");
        std::fs::create_dir_all(&output_dir).unwrap();

        let pool = open_pool(dir.path()).await;
        let repo: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(pool.clone()));
        let orchestrator = Arc::new(JobOrchestrator::new(
            repo.clone(),
            WorkerSupervisor::new(Arc::new(sh_launcher(&script))),
            Arc::new(UuidProvider),
            Arc::new(SystemTimeProvider),
            output_dir,
        ));

        Self {
            dir,
            pool,
            repo,
            orchestrator,
        }
    }

    /// Poll until the job is terminal and its supervisor has let go
    pub async fn wait_for_terminal(&self, id: &JobId) -> Job {
        let orchestrator = self.orchestrator.clone();
        let job = wait_until(&self.orchestrator, id, |job| job.is_terminal()).await;
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        while orchestrator.is_supervising(id) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "supervisor of job {} never finished",
                id
            );
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        job
    }
}

pub async fn wait_until(
    orchestrator: &JobOrchestrator,
    id: &JobId,
    done: impl Fn(&Job) -> bool,
) -> Job {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        let job = orchestrator.get_job(id).await.unwrap();
        if done(&job) {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for job {} (status {}, progress {})",
            id,
            job.status,
            job.progress
        );
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
