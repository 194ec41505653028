// SPDX-License-Identifier: MIT

//! Daemon lifecycle: start the workers, wait for end of input or a
//! termination signal, then drain and stop everything in order.
//!
//! Ordering on the way down matters. End of input first shuts the
//! queue so the push worker consumes every line it was handed, then
//! the retry backlog gets a bounded window to drain, and only then are
//! the polling workers told to stop. A termination signal skips the
//! backlog wait but still drains the queue.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use logship_core::{Config, HttpSink, LineQueue, Metrics, ProcessTable, Sink, SinkError};
use logship_storage::Wal;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{ingest, workers};

/// How long each worker gets to stop before it is abandoned.
const JOIN_WAIT: Duration = Duration::from_secs(5);
const POLL_STEP: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),
}

/// Run the daemon to completion.
pub fn run(config: Config) -> Result<(), LifecycleError> {
    let metrics = Arc::new(Metrics::new());
    let queue = Arc::new(LineQueue::new());
    let shutdown = Arc::new(AtomicBool::new(false));

    // A broken retry log degrades durability but never blocks startup.
    let wal = match Wal::open(&config.wal_path(), config.wal_fsync) {
        Ok(wal) => {
            if wal.is_replay_pending() {
                info!("retry log backlog found, replay scheduled");
            }
            Some(Arc::new(wal))
        }
        Err(e) => {
            error!(
                "cannot open retry log at {}: {}; running without durability",
                config.wal_path().display(),
                e
            );
            None
        }
    };

    // A bad endpoint setup is fatal; a missing one just disables push.
    let sink: Option<Arc<dyn Sink>> = match config.push_url.as_deref() {
        Some(url) => {
            let sink = HttpSink::new(url, config.push_token.as_deref(), config.ca_file.as_deref())?;
            info!("pushing to {}", url);
            Some(Arc::new(sink))
        }
        None => {
            warn!("no push endpoint configured; lines are mirrored only");
            None
        }
    };

    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))?;
    }

    let push_handle = spawn("push", {
        let ctx = workers::PushContext {
            queue: Arc::clone(&queue),
            sink: sink.clone(),
            wal: wal.clone(),
            metrics: Arc::clone(&metrics),
            table: ProcessTable::new(&config.pid_file),
            labels: config.labels.clone(),
            annotate: open_annotate(&config),
        };
        move || workers::run_push(ctx)
    })?;

    let replay_handle = match (wal.clone(), sink.clone()) {
        (Some(wal), Some(sink)) => {
            let metrics = Arc::clone(&metrics);
            let shutdown = Arc::clone(&shutdown);
            Some(spawn("replay", move || {
                workers::run_replay(wal, sink, metrics, shutdown)
            })?)
        }
        _ => None,
    };

    let stats_handle = spawn("stats", {
        let metrics = Arc::clone(&metrics);
        let queue = Arc::clone(&queue);
        let path = config.stats_file.clone();
        let interval = config.stats_interval;
        let shutdown = Arc::clone(&shutdown);
        move || workers::run_stats(metrics, queue, path, interval, shutdown)
    })?;

    let ingest_handle = spawn("ingest", {
        let queue = Arc::clone(&queue);
        let metrics = Arc::clone(&metrics);
        let mirror_file = config.mirror_file.clone();
        move || {
            let mut mirror = open_mirror(mirror_file.as_deref());
            let stdin = std::io::stdin();
            match ingest::run_ingest(stdin.lock(), &mut mirror, &queue, &metrics) {
                Ok(lines) => info!("input closed after {} lines", lines),
                Err(e) => warn!("input read failed: {}", e),
            }
        }
    })?;

    // Wait for end of input or a signal. On a signal the ingest thread
    // may stay parked on stdin; process exit reclaims it.
    while !shutdown.load(Ordering::SeqCst) && !ingest_handle.is_finished() {
        std::thread::sleep(POLL_STEP);
    }
    let input_closed = ingest_handle.is_finished();
    if input_closed {
        join_bounded("ingest", ingest_handle);
    }

    // Drain whatever the ingest loop queued before stopping the push
    // worker. It exits on its own once the queue is empty.
    queue.shutdown();
    join_bounded("push", push_handle);

    // On clean end of input, give the replay worker a bounded window
    // to finish delivering the backlog. Pointless without one.
    if input_closed && replay_handle.is_some() {
        if let Some(wal) = wal.as_deref() {
            let deadline = Instant::now() + config.drain_max_wait;
            while wal.is_replay_pending()
                && !shutdown.load(Ordering::SeqCst)
                && Instant::now() < deadline
            {
                std::thread::sleep(POLL_STEP);
            }
            if wal.is_replay_pending() {
                warn!(
                    "retry backlog not drained within {:?}; it survives for the next run",
                    config.drain_max_wait
                );
            }
        }
    }

    shutdown.store(true, Ordering::SeqCst);
    if let Some(handle) = replay_handle {
        join_bounded("replay", handle);
    }
    join_bounded("stats", stats_handle);

    // Always leave a final snapshot behind, whatever ended the run.
    let snapshot = metrics.snapshot(queue.len() as u64);
    if let Err(e) = snapshot.write_to(&config.stats_file) {
        warn!("final stats write failed: {}", e);
    }

    info!("shutdown complete");
    Ok(())
}

fn spawn<F>(name: &str, f: F) -> Result<JoinHandle<()>, LifecycleError>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(LifecycleError::Spawn)
}

fn join_bounded(name: &str, handle: JoinHandle<()>) {
    let deadline = Instant::now() + JOIN_WAIT;
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(POLL_STEP);
    }
    if handle.is_finished() {
        if handle.join().is_err() {
            warn!("{} worker panicked", name);
        }
    } else {
        warn!("{} worker did not stop in time, abandoning it", name);
    }
}

fn open_annotate(config: &Config) -> Option<File> {
    let path = config.annotate_file.as_deref()?;
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            warn!("cannot open annotate file {}: {}", path.display(), e);
            None
        }
    }
}

/// The mirror target replaces stdout when a file is configured.
fn open_mirror(path: Option<&std::path::Path>) -> Box<dyn Write + Send> {
    match path {
        Some(path) => match File::create(path) {
            Ok(file) => Box::new(file),
            Err(e) => {
                warn!("cannot open mirror file {}: {}; mirroring to stdout", path.display(), e);
                Box::new(std::io::stdout())
            }
        },
        None => Box::new(std::io::stdout()),
    }
}
