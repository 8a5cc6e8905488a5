// Daemon configuration
//
// Sources, later ones win:
// 1. built-in defaults
// 2. optional `restyle.toml` (or the path in RESTYLE_CONFIG)
// 3. RESTYLE__* environment variables, `__` separating nested keys
//    (RESTYLE__RPC__PORT=9000, RESTYLE__WORKER__SCRIPT=worker/style_transfer.py)

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "restyle";
const ENV_PREFIX: &str = "RESTYLE";
const ENV_SEPARATOR: &str = "__";

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Sqlite,
    Memory,
}

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Deserialize, Debug)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_host")]
    pub host: String,
    #[serde(default = "default_rpc_port")]
    pub port: u16,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: default_rpc_host(),
            port: default_rpc_port(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_program")]
    pub program: String,
    /// Script passed as the first argument, e.g. `style_transfer.py`
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default = "default_env_allowlist")]
    pub env_allowlist: Vec<String>,
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

impl WorkerConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: default_worker_program(),
            script: None,
            working_dir: None,
            env_allowlist: default_env_allowlist(),
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    /// SQLite URL or plain path; `~` is expanded
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_store")]
    pub store: StoreKind,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    #[serde(default)]
    pub worker: WorkerConfig,
}

fn default_database_url() -> String {
    "~/.restyle/jobs.db".to_string()
}

fn default_store() -> StoreKind {
    StoreKind::Sqlite
}

fn default_rpc_host() -> String {
    "127.0.0.1".to_string()
}

fn default_rpc_port() -> u16 {
    9527
}

fn default_output_dir() -> String {
    "outputs".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_worker_program() -> String {
    "python3".to_string()
}

fn default_env_allowlist() -> Vec<String> {
    restyle_infra_system::default_env_allowlist()
}

fn default_kill_grace_ms() -> u64 {
    restyle_infra_system::DEFAULT_KILL_GRACE.as_millis() as u64
}

impl AppConfig {
    /// Database URL with `~` expanded and the `sqlite://` scheme added to bare paths
    pub fn resolved_database_url(&self) -> String {
        let expanded = shellexpand::tilde(&self.database_url).into_owned();
        if expanded.starts_with("sqlite:") {
            expanded
        } else {
            format!("sqlite://{}", expanded)
        }
    }

    /// On-disk database file, if the URL names one
    pub fn database_file(&self) -> Option<PathBuf> {
        let url = self.resolved_database_url();
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))?;
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path.contains(":memory:") {
            return None;
        }
        Some(PathBuf::from(path))
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.output_dir).into_owned())
    }

    pub fn worker_working_dir(&self) -> Option<PathBuf> {
        self.worker
            .working_dir
            .as_deref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).into_owned()))
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .list_separator(",")
        .with_list_parse_key("worker.env_allowlist")
        .try_parsing(true)
}

fn build(file: &str, env: Environment) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(env)
        .build()?;

    config.try_deserialize()
}

/// Load configuration from the config file and the process environment
pub fn get_config() -> Result<AppConfig, ConfigError> {
    let file = std::env::var("RESTYLE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    build(&file, environment())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_from(vars: &[(&str, &str)]) -> Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = build("/nonexistent/restyle", env_from(&[])).unwrap();

        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.rpc.host, "127.0.0.1");
        assert_eq!(config.rpc.port, 9527);
        assert_eq!(config.output_dir, "outputs");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.worker.program, "python3");
        assert_eq!(config.worker.kill_grace(), Duration::from_secs(5));
        assert!(config.worker.env_allowlist.contains(&"PATH".to_string()));
        assert!(config.resolved_database_url().starts_with("sqlite://"));
    }

    #[test]
    fn test_file_then_env_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
store = "memory"
output_dir = "/srv/restyle/out"
log_format = "json"

[rpc]
port = 9600

[worker]
program = "python3"
script = "style_transfer.py"
"#
        )
        .unwrap();
        file.flush().unwrap();
        let path = file.path().with_extension("");
        let name = path.to_string_lossy().to_string();

        let config = build(
            &name,
            env_from(&[
                ("RESTYLE__RPC__PORT", "9700"),
                ("RESTYLE__WORKER__KILL_GRACE_MS", "250"),
                ("RESTYLE__WORKER__ENV_ALLOWLIST", "PATH,CUDA_VISIBLE_DEVICES"),
            ]),
        )
        .unwrap();

        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.output_dir(), PathBuf::from("/srv/restyle/out"));
        assert_eq!(config.rpc.port, 9700);
        assert_eq!(config.worker.script.as_deref(), Some("style_transfer.py"));
        assert_eq!(config.worker.kill_grace(), Duration::from_millis(250));
        assert_eq!(
            config.worker.env_allowlist,
            vec!["PATH".to_string(), "CUDA_VISIBLE_DEVICES".to_string()]
        );
    }

    #[test]
    fn test_database_url_resolution() {
        let mut config = build("/nonexistent/restyle", env_from(&[])).unwrap();

        config.database_url = "/var/lib/restyle/jobs.db".to_string();
        assert_eq!(config.resolved_database_url(), "sqlite:///var/lib/restyle/jobs.db");
        assert_eq!(
            config.database_file(),
            Some(PathBuf::from("/var/lib/restyle/jobs.db"))
        );

        config.database_url = "sqlite::memory:".to_string();
        assert_eq!(config.resolved_database_url(), "sqlite::memory:");
        assert_eq!(config.database_file(), None);
    }
}
