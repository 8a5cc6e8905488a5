// Worker Launcher Port
// Abstraction for starting the external worker and streaming its output

use crate::domain::{Job, JobId};
use crate::port::cancellation::CancelToken;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Positional arguments passed to the worker.
///
/// Order is significant:
/// 1. input path
/// 2. reference path, or `""`
/// 3. style template id, or `""`
/// 4. JSON object of the style options
/// 5. output path
/// 6. job id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInvocation {
    pub job_id: JobId,
    pub args: Vec<String>,
}

impl WorkerInvocation {
    pub fn for_job(job: &Job, output_path: &str) -> Result<Self, ExecutionError> {
        let options = serde_json::to_string(&job.options)
            .map_err(|e| ExecutionError::InvalidPayload(e.to_string()))?;

        Ok(Self {
            job_id: job.id.clone(),
            args: vec![
                job.input_path.clone(),
                job.reference_path.clone().unwrap_or_default(),
                job.style_template.clone().unwrap_or_default(),
                options,
                output_path.to_string(),
                job.id.clone(),
            ],
        })
    }
}

/// Output of a running worker, in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerSignal {
    Stdout(String),
    Stderr(String),
    /// Process ended. `None` when it was terminated by a signal.
    /// Always the last signal sent.
    Exited(Option<i32>),
}

/// Launch errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Worker Launcher trait
///
/// Implementations:
/// - SubprocessLauncher (infra-system): spawns an OS process
/// - mocks below: scripted output for tests
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Start the worker and return the receiving end of its output.
    ///
    /// Implementations must terminate the worker once `cancel` fires and
    /// must finish the stream with `WorkerSignal::Exited`.
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the process cannot be started
    async fn launch(
        &self,
        invocation: &WorkerInvocation,
        cancel: CancelToken,
    ) -> Result<mpsc::Receiver<WorkerSignal>, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// A complete `METRICS:` payload as the style-transfer worker emits it
    pub const SAMPLE_METRICS_JSON: &str = r#"{"processing_time":"1:30","style_match":82,"colors_analyzed":1200,"output_size":"12MB"}"#;

    /// Replays a fixed list of signals, recording every invocation
    pub struct ScriptedLauncher {
        signals: Vec<WorkerSignal>,
        invocations: Mutex<Vec<WorkerInvocation>>,
    }

    impl ScriptedLauncher {
        pub fn new(signals: Vec<WorkerSignal>) -> Self {
            Self {
                signals,
                invocations: Mutex::new(Vec::new()),
            }
        }

        /// Worker that reports progress, metrics, and exits 0
        pub fn succeeding(metrics_json: &str) -> Self {
            Self::new(vec![
                WorkerSignal::Stdout("PROGRESS:50".to_string()),
                WorkerSignal::Stdout(format!("METRICS:{}", metrics_json)),
                WorkerSignal::Exited(Some(0)),
            ])
        }

        /// Worker that writes to stderr and exits with the given code
        pub fn failing(stderr: &str, code: i32) -> Self {
            Self::new(vec![
                WorkerSignal::Stderr(stderr.to_string()),
                WorkerSignal::Exited(Some(code)),
            ])
        }

        pub fn invocations(&self) -> Vec<WorkerInvocation> {
            self.invocations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WorkerLauncher for ScriptedLauncher {
        async fn launch(
            &self,
            invocation: &WorkerInvocation,
            _cancel: CancelToken,
        ) -> Result<mpsc::Receiver<WorkerSignal>, ExecutionError> {
            self.invocations.lock().unwrap().push(invocation.clone());

            let (tx, rx) = mpsc::channel(self.signals.len().max(1));
            for signal in &self.signals {
                let _ = tx.send(signal.clone()).await;
            }
            Ok(rx)
        }
    }

    /// Hands each launched worker's sender to the test, which drives it by hand.
    ///
    /// On cancellation the launcher reports `Exited(None)` like a killed process.
    #[derive(Default)]
    pub struct ManualLauncher {
        senders: Mutex<Vec<mpsc::Sender<WorkerSignal>>>,
    }

    impl ManualLauncher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sender of the most recently launched worker
        pub fn last_sender(&self) -> Option<mpsc::Sender<WorkerSignal>> {
            self.senders.lock().unwrap().last().cloned()
        }

        pub fn launch_count(&self) -> usize {
            self.senders.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl WorkerLauncher for ManualLauncher {
        async fn launch(
            &self,
            _invocation: &WorkerInvocation,
            mut cancel: CancelToken,
        ) -> Result<mpsc::Receiver<WorkerSignal>, ExecutionError> {
            let (tx, rx) = mpsc::channel(64);
            self.senders.lock().unwrap().push(tx.clone());

            tokio::spawn(async move {
                cancel.cancelled().await;
                let _ = tx.send(WorkerSignal::Exited(None)).await;
            });
            Ok(rx)
        }
    }

    /// Always fails to start
    pub struct FailingLauncher {
        message: String,
    }

    impl FailingLauncher {
        pub fn new(message: impl Into<String>) -> Self {
            Self {
                message: message.into(),
            }
        }
    }

    #[async_trait]
    impl WorkerLauncher for FailingLauncher {
        async fn launch(
            &self,
            _invocation: &WorkerInvocation,
            _cancel: CancelToken,
        ) -> Result<mpsc::Receiver<WorkerSignal>, ExecutionError> {
            Err(ExecutionError::SpawnFailed(self.message.clone()))
        }
    }
}
