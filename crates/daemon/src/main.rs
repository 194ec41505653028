// SPDX-License-Identifier: MIT

//! `logshipd`: reads log lines from stdin, mirrors them, and forwards
//! them to an aggregation endpoint with a crash-safe retry log.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use logship_core::{Config, Overrides};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod ingest;
mod lifecycle;
mod workers;

/// Durable stdin-to-endpoint log forwarder
#[derive(Debug, Parser)]
#[command(name = "logshipd", version, about)]
struct Cli {
    /// Directory for the retry log and other runtime files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Push endpoint URL; omit to disable live delivery
    #[arg(long)]
    push_url: Option<String>,

    /// Bearer token for the push endpoint
    #[arg(long)]
    push_token: Option<String>,

    /// PEM bundle of additional trusted root certificates
    #[arg(long)]
    ca_file: Option<PathBuf>,

    /// Mirror verbatim input to this file instead of stdout
    #[arg(long)]
    mirror_file: Option<PathBuf>,

    /// Append annotated NDJSON records to this file
    #[arg(long)]
    annotate_file: Option<PathBuf>,

    /// Process-name table used to label lines by pid
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Where periodic metrics snapshots are written
    #[arg(long)]
    stats_file: Option<PathBuf>,

    /// Snapshot interval, e.g. "30" or "45s" (minimum 10s)
    #[arg(long)]
    stats_interval: Option<String>,

    /// How long to wait for the retry backlog after end of input
    #[arg(long)]
    drain_max_wait: Option<String>,

    /// Fsync the retry log on every append
    #[arg(long)]
    wal_fsync: bool,

    /// Stream label: job name
    #[arg(long)]
    job: Option<String>,

    /// Stream label: namespace
    #[arg(long)]
    namespace: Option<String>,

    /// Stream label: pod name
    #[arg(long)]
    pod: Option<String>,
}

impl Cli {
    fn into_overrides(self) -> Overrides {
        Overrides {
            data_dir: self.data_dir,
            push_url: self.push_url,
            push_token: self.push_token,
            ca_file: self.ca_file,
            mirror_file: self.mirror_file,
            annotate_file: self.annotate_file,
            pid_file: self.pid_file,
            stats_file: self.stats_file,
            stats_interval: self.stats_interval,
            drain_max_wait: self.drain_max_wait,
            wal_fsync: self.wal_fsync,
            job: self.job,
            namespace: self.namespace,
            pod: self.pod,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let config = match Config::resolve(cli.into_overrides()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match lifecycle::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr; stdout stays free for the mirror.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("LOGSHIP_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
