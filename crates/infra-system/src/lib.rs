// Restyle Infrastructure - System Adapters
// Implements: WorkerLauncher

pub mod subprocess_launcher;

pub use subprocess_launcher::{default_env_allowlist, SubprocessLauncher, DEFAULT_KILL_GRACE};
