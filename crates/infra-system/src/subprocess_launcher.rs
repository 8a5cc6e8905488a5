// Subprocess worker launcher
// Spawns the style-transfer worker and streams its output line by line
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use restyle_core::port::{
    CancelToken, ExecutionError, WorkerInvocation, WorkerLauncher, WorkerSignal,
};

/// Time between SIGTERM and SIGKILL when a worker is cancelled (5s)
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// How long to wait for the output readers after the process exited (5s)
/// Grandchildren that inherited the pipes can keep them open indefinitely
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

const SIGNAL_CHANNEL_CAPACITY: usize = 256;

/// Environment variables passed to the worker by default
pub fn default_env_allowlist() -> Vec<String> {
    ["PATH", "HOME", "USER", "PYTHONPATH"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Launches the worker as a child process: `<program> [script] <args...>`
///
/// The child starts with an empty environment plus the allowlisted
/// variables of the engine process.
pub struct SubprocessLauncher {
    program: String,
    script: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    env_allowlist: Vec<String>,
    kill_grace: Duration,
}

impl SubprocessLauncher {
    /// # Example
    /// ```ignore
    /// let launcher = SubprocessLauncher::new("python3")
    ///     .with_script("worker/style_transfer.py")
    ///     .with_kill_grace(Duration::from_secs(2));
    /// ```
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            script: None,
            working_dir: None,
            env_allowlist: default_env_allowlist(),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env_allowlist(mut self, allowlist: Vec<String>) -> Self {
        self.env_allowlist = allowlist;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Keep only allowlisted variables
    fn filter_env(
        &self,
        env: impl IntoIterator<Item = (String, String)>,
    ) -> Vec<(String, String)> {
        env.into_iter()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .collect()
    }

    fn command(&self, invocation: &WorkerInvocation) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(script) = &self.script {
            cmd.arg(script);
        }
        cmd.args(&invocation.args)
            .env_clear()
            .envs(self.filter_env(std::env::vars()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl WorkerLauncher for SubprocessLauncher {
    async fn launch(
        &self,
        invocation: &WorkerInvocation,
        mut cancel: CancelToken,
    ) -> Result<mpsc::Receiver<WorkerSignal>, ExecutionError> {
        let mut child = self
            .command(invocation)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(format!("{}: {}", self.program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::IoError("worker stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionError::IoError("worker stderr not captured".to_string()))?;

        let job_id = invocation.job_id.clone();
        info!(
            job_id = %job_id,
            program = %self.program,
            pid = ?child.id(),
            "Worker process started"
        );

        let (tx, rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let mut stdout_task = tokio::spawn(forward_lines(stdout, tx.clone(), WorkerSignal::Stdout));
        let mut stderr_task = tokio::spawn(forward_lines(stderr, tx.clone(), WorkerSignal::Stderr));
        let kill_grace = self.kill_grace;

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = cancel.cancelled() => terminate(&mut child, kill_grace, &job_id).await,
            };

            let drain = async {
                let _ = (&mut stdout_task).await;
                let _ = (&mut stderr_task).await;
            };
            if timeout(READER_DRAIN_TIMEOUT, drain).await.is_err() {
                warn!(job_id = %job_id, "Worker output still open after exit, dropping readers");
                stdout_task.abort();
                stderr_task.abort();
            }

            let code = match status {
                Ok(status) => {
                    info!(job_id = %job_id, exit_code = ?status.code(), "Worker process exited");
                    status.code()
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Failed to wait for worker process");
                    None
                }
            };
            let _ = tx.send(WorkerSignal::Exited(code)).await;
        });

        Ok(rx)
    }
}

/// Forward each line of `stream` until EOF; invalid UTF-8 is replaced
async fn forward_lines<R>(
    stream: R,
    tx: mpsc::Sender<WorkerSignal>,
    wrap: fn(String) -> WorkerSignal,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(&['\r', '\n'][..])
                    .to_string();
                if tx.send(wrap(line)).await.is_err() {
                    debug!("Signal receiver dropped, stopping reader");
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read worker output");
                break;
            }
        }
    }
}

/// SIGTERM first, then SIGKILL once the grace period runs out
async fn terminate(child: &mut Child, grace: Duration, job_id: &str) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            info!(job_id = %job_id, pid = %pid, "Sending SIGTERM to worker");
            match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => match timeout(grace, child.wait()).await {
                    Ok(status) => return status,
                    Err(_) => warn!(
                        job_id = %job_id,
                        pid = %pid,
                        "Worker did not exit after SIGTERM, sending SIGKILL"
                    ),
                },
                Err(e) => warn!(job_id = %job_id, error = %e, "SIGTERM failed"),
            }
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    info!(job_id = %job_id, "Killing worker");
    child.kill().await?;
    child.wait().await
}
