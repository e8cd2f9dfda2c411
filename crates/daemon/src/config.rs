//! Daemon configuration
//!
//! Read once from the environment at startup. Parsing works over a lookup
//! closure so tests never touch the process environment.

use groupq_api_rpc::RpcServerConfig;
use groupq_core::application::worker::constants::{
    DEFAULT_HANDLER_WORK, DEFAULT_SHUTDOWN_GRACE, DEFAULT_STALLED_WINDOW_MS,
    ERROR_RECOVERY_SLEEP_DURATION, IDLE_SLEEP_DURATION,
};
use groupq_core::application::PoolSettings;
use groupq_core::domain::queue::DEFAULT_KEEP_JOBS;
use groupq_core::domain::{PerCategory, QueueCategory, QueueConfig};
use groupq_core::error::{AppError, Result};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.groupq/broker.db";

/// Where jobs live between submission and completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    Sqlite,
    Memory,
}

impl FromStr for BrokerKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(BrokerKind::Sqlite),
            "memory" => Ok(BrokerKind::Memory),
            other => Err(AppError::Config(format!(
                "GROUPQ_BROKER must be \"sqlite\" or \"memory\", got \"{}\"",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!(
                "GROUPQ_LOG_FORMAT must be \"pretty\" or \"json\", got \"{}\"",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub queues: PerCategory<QueueConfig>,
    pub broker: BrokerKind,
    pub db_path: PathBuf,
    pub rpc: RpcServerConfig,
    pub pool: PoolSettings,
    pub shutdown_grace: Duration,
    pub stalled_window_ms: i64,
    pub handler_work: Duration,
    pub host_id: String,
    pub log_format: LogFormat,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let keep_completed = parse_or(&lookup, "KEEP_COMPLETED_JOBS", DEFAULT_KEEP_JOBS)?;
        let keep_failed = parse_or(&lookup, "KEEP_FAILED_JOBS", DEFAULT_KEEP_JOBS)?;

        let queues = PerCategory::try_from_fn(|category| {
            let default = QueueConfig::default_for(category).concurrency;
            let concurrency = parse_or(&lookup, concurrency_key(category), default)?;
            let config =
                QueueConfig::new(category, concurrency).with_retention(keep_completed, keep_failed);
            config.validate()?;
            Ok::<_, AppError>(config)
        })?;

        let defaults = RpcServerConfig::default();
        let db_path = lookup("GROUPQ_DB_PATH")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        Ok(Self {
            queues,
            broker: parse_or(&lookup, "GROUPQ_BROKER", BrokerKind::Sqlite)?,
            db_path: PathBuf::from(shellexpand::tilde(&db_path).into_owned()),
            rpc: RpcServerConfig {
                host: lookup("GROUPQ_RPC_HOST").unwrap_or(defaults.host),
                port: parse_or(&lookup, "GROUPQ_RPC_PORT", defaults.port)?,
            },
            pool: PoolSettings {
                poll_interval: millis_or(&lookup, "GROUPQ_POLL_INTERVAL_MS", IDLE_SLEEP_DURATION)?,
                error_backoff: millis_or(
                    &lookup,
                    "GROUPQ_ERROR_BACKOFF_MS",
                    ERROR_RECOVERY_SLEEP_DURATION,
                )?,
            },
            shutdown_grace: millis_or(&lookup, "GROUPQ_SHUTDOWN_GRACE_MS", DEFAULT_SHUTDOWN_GRACE)?,
            stalled_window_ms: parse_or(
                &lookup,
                "GROUPQ_STALLED_WINDOW_MS",
                DEFAULT_STALLED_WINDOW_MS,
            )?,
            handler_work: millis_or(&lookup, "GROUPQ_HANDLER_WORK_MS", DEFAULT_HANDLER_WORK)?,
            host_id: lookup("GROUPQ_HOST_ID")
                .filter(|h| !h.trim().is_empty())
                .unwrap_or_else(|| format!("pid-{}", std::process::id())),
            log_format: parse_or(&lookup, "GROUPQ_LOG_FORMAT", LogFormat::Pretty)?,
        })
    }

    pub fn queue(&self, category: QueueCategory) -> &QueueConfig {
        self.queues.get(category)
    }
}

fn concurrency_key(category: QueueCategory) -> &'static str {
    match category {
        QueueCategory::Message => "MESSAGE_QUEUE_CONCURRENCY",
        QueueCategory::Import => "IMPORTATIONS_QUEUE_CONCURRENCY",
        QueueCategory::Export => "EXPORTATIONS_QUEUE_CONCURRENCY",
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{}={:?}: {}", key, raw, e))),
    }
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(lookup, key, default_ms).map(Duration::from_millis)
}
