// SPDX-License-Identifier: MIT

//! Immutable runtime configuration
//!
//! Built once at startup from CLI overrides with environment-variable
//! fallbacks, validated, then shared into every worker. Nothing in
//! here changes after `resolve` returns.

use crate::payload::StreamLabels;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(30);
pub const MIN_STATS_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_DRAIN_MAX_WAIT: Duration = Duration::from_secs(10);

const WAL_FILE_NAME: &str = "logship.wal";

/// Configuration/argument errors: reported synchronously, non-zero
/// exit, no partial operation attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("data directory {0} does not exist or is not a directory")]
    DataDirMissing(PathBuf),
    #[error("data directory {0} is not writable: {1}")]
    DataDirUnwritable(PathBuf, std::io::Error),
    #[error("invalid duration for {name}: {value:?}")]
    InvalidDuration { name: &'static str, value: String },
}

/// Raw optional settings, typically from CLI flags. Anything left
/// unset falls back to the matching `LOGSHIP_*` environment variable,
/// then to the default.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub push_url: Option<String>,
    pub push_token: Option<String>,
    pub ca_file: Option<PathBuf>,
    pub mirror_file: Option<PathBuf>,
    pub annotate_file: Option<PathBuf>,
    pub pid_file: Option<PathBuf>,
    pub stats_file: Option<PathBuf>,
    pub stats_interval: Option<String>,
    pub drain_max_wait: Option<String>,
    pub wal_fsync: bool,
    pub job: Option<String>,
    pub namespace: Option<String>,
    pub pod: Option<String>,
}

/// Resolved, validated configuration shared by all workers
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Push endpoint; `None` disables the live delivery path
    pub push_url: Option<String>,
    pub push_token: Option<String>,
    pub ca_file: Option<PathBuf>,
    /// Mirror target for verbatim input; `None` mirrors to stdout
    pub mirror_file: Option<PathBuf>,
    /// NDJSON annotate side channel; `None` disables it
    pub annotate_file: Option<PathBuf>,
    pub pid_file: PathBuf,
    pub stats_file: PathBuf,
    pub stats_interval: Duration,
    pub drain_max_wait: Duration,
    pub wal_fsync: bool,
    pub labels: StreamLabels,
}

impl Config {
    /// Resolve overrides against the environment and validate.
    pub fn resolve(overrides: Overrides) -> Result<Self, ConfigError> {
        let data_dir = overrides
            .data_dir
            .or_else(|| env_path("LOGSHIP_DATA_DIR"))
            .unwrap_or_else(|| PathBuf::from("."));

        if !data_dir.is_dir() {
            return Err(ConfigError::DataDirMissing(data_dir));
        }
        probe_writable(&data_dir)?;

        let host = hostname();
        let job = overrides
            .job
            .or_else(|| env_string("LOGSHIP_JOB"))
            .unwrap_or_else(|| host.clone());
        let namespace = overrides
            .namespace
            .or_else(|| env_string("LOGSHIP_NAMESPACE"))
            .unwrap_or_else(|| "default".to_string());
        let pod = overrides
            .pod
            .or_else(|| env_string("LOGSHIP_POD"))
            .unwrap_or_else(|| host.clone());

        let stats_interval = parse_duration(
            "stats-interval",
            overrides
                .stats_interval
                .or_else(|| env_string("LOGSHIP_STATS_INTERVAL")),
            DEFAULT_STATS_INTERVAL,
        )?
        .max(MIN_STATS_INTERVAL);

        let drain_max_wait = parse_duration(
            "drain-max-wait",
            overrides
                .drain_max_wait
                .or_else(|| env_string("LOGSHIP_DRAIN_MAX_WAIT")),
            DEFAULT_DRAIN_MAX_WAIT,
        )?;

        Ok(Self {
            push_url: overrides.push_url.or_else(|| env_string("LOGSHIP_PUSH_URL")),
            push_token: overrides
                .push_token
                .or_else(|| env_string("LOGSHIP_PUSH_TOKEN")),
            ca_file: overrides.ca_file.or_else(|| env_path("LOGSHIP_CA_FILE")),
            mirror_file: overrides
                .mirror_file
                .or_else(|| env_path("LOGSHIP_MIRROR_FILE")),
            annotate_file: overrides
                .annotate_file
                .or_else(|| env_path("LOGSHIP_ANNOTATE_FILE")),
            pid_file: overrides
                .pid_file
                .or_else(|| env_path("LOGSHIP_PID_FILE"))
                .unwrap_or_else(|| data_dir.join("pid.map")),
            stats_file: overrides
                .stats_file
                .or_else(|| env_path("LOGSHIP_STATS_FILE"))
                .unwrap_or_else(|| data_dir.join("logship.stats")),
            stats_interval,
            drain_max_wait,
            wal_fsync: overrides.wal_fsync || env_truthy("LOGSHIP_WAL_FSYNC"),
            labels: StreamLabels {
                job,
                host,
                namespace,
                pod,
            },
            data_dir,
        })
    }

    /// The WAL always lives in the data directory
    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(WAL_FILE_NAME)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_string(name).map(PathBuf::from)
}

fn env_truthy(name: &str) -> bool {
    matches!(
        env_string(name).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}

fn hostname() -> String {
    env_string("HOSTNAME").unwrap_or_else(|| "localhost".to_string())
}

/// Accept either bare seconds (`"30"`) or a humantime form (`"30s"`)
fn parse_duration(
    name: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(&value).map_err(|_| ConfigError::InvalidDuration { name, value })
}

/// Startup refuses a data directory it cannot write into; a
/// throwaway probe file is the portable check.
fn probe_writable(dir: &Path) -> Result<(), ConfigError> {
    let probe = dir.join(format!(".logship-probe-{}", std::process::id()));
    match std::fs::File::create(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            Ok(())
        }
        Err(e) => Err(ConfigError::DataDirUnwritable(dir.to_path_buf(), e)),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
