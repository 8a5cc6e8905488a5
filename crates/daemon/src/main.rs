//! Restyle Job Engine - Main Entry Point
//! Composition root: config, logging, store, worker launcher, JSON-RPC server

mod config;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import workspace crates
use restyle_api_rpc::{RpcServer, RpcServerConfig};
use restyle_core::application::{JobOrchestrator, RecoveryService, WorkerSupervisor};
use restyle_core::port::{InMemoryJobRepository, JobRepository, SystemTimeProvider, UuidProvider};
use restyle_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};
use restyle_infra_system::SubprocessLauncher;

use crate::config::{AppConfig, LogFormat, StoreKind};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_logging(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("restyle=info"));

    match format {
        LogFormat::Json => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn JobRepository>> {
    match config.store {
        StoreKind::Memory => {
            warn!("Using in-memory job store; records are lost on exit");
            Ok(Arc::new(InMemoryJobRepository::new()))
        }
        StoreKind::Sqlite => {
            if let Some(parent) = config.database_file().as_ref().and_then(|f| f.parent()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }

            let url = config.resolved_database_url();
            info!(database_url = %url, "Initializing database...");

            let pool = create_pool(&url).await.context("DB pool creation failed")?;
            run_migrations(&pool).await.context("Migration failed")?;
            Ok(Arc::new(SqliteJobRepository::new(pool)))
        }
    }
}

fn build_launcher(config: &AppConfig) -> SubprocessLauncher {
    let worker = &config.worker;
    let mut launcher = SubprocessLauncher::new(worker.program.clone())
        .with_env_allowlist(worker.env_allowlist.clone())
        .with_kill_grace(worker.kill_grace());
    if let Some(script) = &worker.script {
        launcher = launcher.with_script(script);
    }
    if let Some(dir) = config.worker_working_dir() {
        launcher = launcher.with_working_dir(dir);
    }
    launcher
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = config::get_config().context("Failed to load configuration")?;

    // 2. Initialize logging
    init_logging(config.log_format);
    info!("Restyle Job Engine v{} starting...", VERSION);

    // 3. Output directory for rendered videos
    let output_dir = config.output_dir();
    std::fs::create_dir_all(&output_dir).with_context(|| {
        format!("Failed to create output directory {}", output_dir.display())
    })?;

    // 4. Job store
    let job_repo = open_store(&config).await?;
    let time_provider = Arc::new(SystemTimeProvider);

    // 5. Fail jobs whose supervisor died with the previous process
    info!("Running startup reconciliation...");
    let recovery_service = RecoveryService::new(job_repo.clone(), time_provider.clone());
    match recovery_service.fail_orphaned_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Startup reconciliation completed"),
        Err(e) => tracing::error!(error = ?e, "Startup reconciliation failed"),
    }

    // 6. Orchestrator (DI wiring)
    info!(
        program = %config.worker.program,
        script = ?config.worker.script,
        "Configuring worker launcher"
    );
    let supervisor = WorkerSupervisor::new(Arc::new(build_launcher(&config)));
    let orchestrator = Arc::new(JobOrchestrator::new(
        job_repo.clone(),
        supervisor,
        Arc::new(UuidProvider),
        time_provider,
        output_dir,
    ));

    // 7. Start JSON-RPC server
    let rpc_config = RpcServerConfig {
        host: config.rpc.host.clone(),
        port: config.rpc.port,
    };
    let (addr, rpc_handle) = RpcServer::new(rpc_config, orchestrator.clone(), job_repo)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(addr = %addr, "System ready. Waiting for jobs...");
    info!("Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Stop accepting requests; running workers are killed with the runtime
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    let active = orchestrator.active_workers();
    if active > 0 {
        warn!(
            active_workers = active,
            "Stopping with workers running; their jobs are failed on next start"
        );
    }

    info!("Shutdown complete.");

    Ok(())
}
