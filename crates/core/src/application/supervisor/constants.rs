// Supervisor constants (no magic values)

/// Maximum bytes of worker stderr kept for failure messages (16 KiB)
pub const DEFAULT_ERROR_BUFFER_LIMIT: usize = 16 * 1024;

/// Exit code the worker uses to report success
pub const SUCCESS_EXIT_CODE: i32 = 0;

pub const LAUNCH_FAILED_MESSAGE: &str = "Failed to launch worker";

pub const MISSING_METRICS_MESSAGE: &str = "Worker exited successfully without reporting metrics";

/// Worker reported metrics but the store refused the completion
pub const COMPLETION_NOT_RECORDED_MESSAGE: &str = "Worker result could not be recorded";

pub const SIGNAL_TERMINATED_MESSAGE: &str = "Worker terminated by signal";

pub const STREAM_CLOSED_MESSAGE: &str = "Worker output stream closed before exit status was reported";

/// Recorded when the supervision task itself panicked
pub const SUPERVISION_PANICKED_MESSAGE: &str = "Worker supervision panicked";
