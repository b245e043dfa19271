//! Worker configuration: TOML files merged in order plus `ODG_WORKER__*`
//! environment overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use odg_tasks::Payload;
use serde::{Deserialize, Serialize};

/// The only supported config format version.
pub const CONFIG_FORMAT_VERSION: &str = "v1alpha1";

/// Prefix of environment variable overrides, e.g. `ODG_WORKER__ODG__ENDPOINT`.
pub const ENV_PREFIX: &str = "ODG_WORKER";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no config file specified")]
    NoFiles,

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("no config version specified: {0}")]
    NoVersion(PathBuf),

    #[error("unsupported config version: {version} ({path})")]
    UnsupportedVersion { version: String, path: PathBuf },

    #[error("config error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkerConfig {
    /// Config format version.
    #[serde(default)]
    pub version: String,
    /// Forces debug logging.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub odg: OdgConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub worker: WorkerSettings,
    /// Periodic reconciliation jobs.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.odg.validate()?;

        if self.database.pool_size == 0 {
            return Err(ConfigError::invalid("database.pool_size must be > 0"));
        }
        if self.metrics.enabled {
            self.metrics.socket_addr()?;
        }
        if self.worker.retry_base_delay_secs > self.worker.retry_max_delay_secs {
            return Err(ConfigError::invalid(
                "worker.retry_base_delay_secs must be <= worker.retry_max_delay_secs",
            ));
        }
        for (index, job) in self.jobs.iter().enumerate() {
            if job.task.trim().is_empty() {
                return Err(ConfigError::invalid(format!("jobs[{index}].task must not be empty")));
            }
            if job.interval_secs == 0 {
                return Err(ConfigError::invalid(format!(
                    "jobs[{index}].interval_secs must be > 0"
                )));
            }
        }
        Ok(())
    }

    /// Effective log level, taking `debug` into account.
    pub fn log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.logging.level
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Inventory database connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL. Takes precedence over the individual options.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_db_user")]
    pub user: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_db_name")]
    pub database: String,

    /// Maximum number of connections
    #[serde(default = "default_db_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in milliseconds
    #[serde(default = "default_db_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Idle timeout in milliseconds
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
}

fn default_db_host() -> String {
    "localhost".into()
}
fn default_db_port() -> u16 {
    5432
}
fn default_db_user() -> String {
    "inventory".into()
}
fn default_db_name() -> String {
    "inventory".into()
}
fn default_db_pool_size() -> u32 {
    10
}
fn default_db_connect_timeout() -> u64 {
    5000
}

impl DatabaseConfig {
    /// Returns `url` if set, otherwise builds one from the individual options.
    pub fn connection_url(&self) -> String {
        if let Some(ref url) = self.url {
            return url.clone();
        }

        let password_part = self
            .password
            .as_ref()
            .map(|p| format!(":{p}"))
            .unwrap_or_default();

        format!(
            "postgres://{}{}@{}:{}/{}",
            self.user, password_part, self.host, self.port, self.database
        )
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: None,
            database: default_db_name(),
            pool_size: default_db_pool_size(),
            connect_timeout_ms: default_db_connect_timeout(),
            idle_timeout_ms: Some(300_000),
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("idle_timeout_ms", &self.idle_timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdgConfig {
    /// Base URL of the Open Delivery Gear API.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Request timeout in milliseconds
    #[serde(default = "default_odg_timeout")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub auth: OdgAuthConfig,
}
fn default_odg_timeout() -> u64 {
    30_000
}
impl Default for OdgConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            user_agent: None,
            timeout_ms: default_odg_timeout(),
            auth: OdgAuthConfig::default(),
        }
    }
}

impl OdgConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid("odg: no api endpoint specified"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("odg.timeout_ms must be > 0"));
        }
        match self.auth.method {
            None => Err(ConfigError::invalid("odg: no auth method specified")),
            Some(AuthMethod::None) => Ok(()),
            Some(AuthMethod::Github) => {
                if self.auth.github.url.trim().is_empty() {
                    return Err(ConfigError::invalid("odg: no github api url specified"));
                }
                if self.auth.github.token.trim().is_empty() {
                    return Err(ConfigError::invalid("odg: no github access token specified"));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    None,
    Github,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OdgAuthConfig {
    #[serde(default)]
    pub method: Option<AuthMethod>,
    #[serde(default)]
    pub github: GithubAuthConfig,
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct GithubAuthConfig {
    /// GitHub API URL, e.g. `https://api.github.com`.
    #[serde(default)]
    pub url: String,
    /// For security, prefer `ODG_WORKER__ODG__AUTH__GITHUB__TOKEN`.
    #[serde(default)]
    pub token: String,
}

impl std::fmt::Debug for GithubAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubAuthConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_address")]
    pub address: String,
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_address() -> String {
    "0.0.0.0:9090".into()
}
impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

impl MetricsConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address
            .parse()
            .map_err(|e| ConfigError::invalid(format!("metrics.address {}: {e}", self.address)))
    }
}

/// Scheduler settings shared by all jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_secs: u64,
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_secs: u64,
}
fn default_retry_base_delay() -> u64 {
    30
}
fn default_retry_max_delay() -> u64 {
    600
}
impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            retry_base_delay_secs: default_retry_base_delay(),
            retry_max_delay_secs: default_retry_max_delay(),
        }
    }
}

/// A task run periodically with a fixed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub task: String,
    pub interval_secs: u64,
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    #[serde(default)]
    pub payload: Payload,
}
fn default_max_retry() -> u32 {
    3
}

impl JobConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

pub mod loader {
    use super::*;
    use config::{Config, Environment, File};

    /// Reads the version declared by a single config file.
    fn file_version(path: &Path) -> Result<Option<String>, ConfigError> {
        let cfg = Config::builder()
            .add_source(File::from(path.to_path_buf()))
            .build()?;
        match cfg.get_string("version") {
            Ok(version) => Ok(Some(version)),
            Err(config::ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads and merges the given files in order, later files winning, then
    /// applies `ODG_WORKER__*` environment overrides and validates the result.
    ///
    /// A file may omit `version` when an earlier file declared it.
    pub fn load_config<P: AsRef<Path>>(paths: &[P]) -> Result<WorkerConfig, ConfigError> {
        if paths.is_empty() {
            return Err(ConfigError::NoFiles);
        }

        let mut builder = Config::builder();
        let mut version: Option<String> = None;
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }

            if let Some(declared) = file_version(path)? {
                version = Some(declared);
            }
            match version.as_deref() {
                None => return Err(ConfigError::NoVersion(path.to_path_buf())),
                Some(CONFIG_FORMAT_VERSION) => {}
                Some(other) => {
                    return Err(ConfigError::UnsupportedVersion {
                        version: other.to_string(),
                        path: path.to_path_buf(),
                    });
                }
            }

            builder = builder.add_source(File::from(path.to_path_buf()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let merged: WorkerConfig = builder.build()?.try_deserialize()?;
        merged.validate()?;
        Ok(merged)
    }
}
