// SPDX-License-Identifier: MIT

//! Background worker loops: push delivery, log retry replay and
//! periodic stats reporting. Each runs on its own OS thread and stops
//! cooperatively, either when the queue shuts down or when the shared
//! shutdown flag is raised.

use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use logship_core::{
    build_push_payload, extract_pid, unix_nanos, AnnotatedRecord, LineQueue, Metrics,
    ProcessTable, Sink, StreamLabels, UNKNOWN_PROCESS,
};
use logship_storage::Wal;
use tracing::{debug, info, warn};

/// Lines containing this marker skip the network and go straight to
/// the write-ahead log, which exercises the persistence path without a
/// reachable endpoint.
pub const WAL_ONLY_MARKER: &str = "WAL-TESTING";

/// How often the replay worker checks for a pending backlog.
pub const REPLAY_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Back-off after a replay pass that made no progress.
pub const REPLAY_COOLDOWN: Duration = Duration::from_secs(5);

const SHUTDOWN_CHECK_STEP: Duration = Duration::from_millis(50);

/// Everything the push worker needs, moved onto its thread.
pub struct PushContext {
    pub queue: Arc<LineQueue>,
    pub sink: Option<Arc<dyn Sink>>,
    pub wal: Option<Arc<Wal>>,
    pub metrics: Arc<Metrics>,
    pub table: ProcessTable,
    pub labels: StreamLabels,
    pub annotate: Option<File>,
}

/// Consume queued lines until the queue is shut down and drained.
///
/// Every line is annotated (when configured) before any delivery
/// attempt, so the side channel sees lines the endpoint later refuses.
/// A failed delivery falls back to the write-ahead log; the line is
/// never dropped as long as the log accepts it.
pub fn run_push(mut ctx: PushContext) {
    while let Some(line) = ctx.queue.pop() {
        let pid = extract_pid(&line).unwrap_or(0);
        let process = ctx
            .table
            .resolve(pid)
            .unwrap_or(UNKNOWN_PROCESS)
            .to_string();
        let ts = unix_nanos();
        let payload = build_push_payload(&ctx.labels, pid, &process, &line, ts);

        if let Some(out) = ctx.annotate.as_mut() {
            write_annotated(out, ts, pid, &process, &line);
        }

        if line.contains(WAL_ONLY_MARKER) {
            append_to_wal(ctx.wal.as_deref(), &ctx.metrics, &payload);
            continue;
        }

        let Some(sink) = ctx.sink.as_ref() else {
            continue;
        };
        match sink.send(&payload) {
            Ok(()) => Metrics::incr(&ctx.metrics.pushed),
            Err(e) => {
                warn!("push failed, diverting to retry log: {}", e);
                Metrics::incr(&ctx.metrics.push_errors);
                append_to_wal(ctx.wal.as_deref(), &ctx.metrics, &payload);
            }
        }
    }
    info!("push worker drained");
}

fn append_to_wal(wal: Option<&Wal>, metrics: &Metrics, payload: &[u8]) {
    match wal {
        Some(wal) => match wal.append(payload) {
            Ok(()) => Metrics::incr(&metrics.wal_appended),
            Err(e) => {
                warn!("retry log append failed, line lost: {}", e);
                Metrics::incr(&metrics.wal_append_errors);
            }
        },
        None => Metrics::incr(&metrics.wal_append_errors),
    }
}

fn write_annotated(out: &mut File, ts: u64, pid: u32, process: &str, line: &str) {
    let record = AnnotatedRecord::new(ts, pid, process, line);
    match record.to_line() {
        Ok(json) => {
            if let Err(e) = writeln!(out, "{}", json) {
                debug!("annotate write failed: {}", e);
            }
        }
        Err(e) => debug!("annotate encode failed: {}", e),
    }
}

/// Poll the write-ahead log and re-deliver its backlog through `sink`.
///
/// A pass stops at the first record the endpoint refuses; everything
/// delivered before that point stays committed, so records are re-sent
/// at most from the refusal onward. A pass with no progress backs off
/// for [`REPLAY_COOLDOWN`] before trying again.
pub fn run_replay(
    wal: Arc<Wal>,
    sink: Arc<dyn Sink>,
    metrics: Arc<Metrics>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        if wal.is_replay_pending() {
            let result = wal.replay(|record| match sink.send(record) {
                Ok(()) => {
                    Metrics::incr(&metrics.wal_replayed);
                    true
                }
                Err(e) => {
                    debug!("replay delivery refused: {}", e);
                    Metrics::incr(&metrics.replay_errors);
                    false
                }
            });
            let progressed = match result {
                Ok(did) => did,
                Err(e) => {
                    warn!("replay pass failed: {}", e);
                    Metrics::incr(&metrics.replay_errors);
                    false
                }
            };
            if !progressed {
                sleep_interruptible(REPLAY_COOLDOWN, &shutdown);
                continue;
            }
        }
        sleep_interruptible(REPLAY_POLL_INTERVAL, &shutdown);
    }
}

/// Write a metrics snapshot to `path` every `interval` until shutdown.
pub fn run_stats(
    metrics: Arc<Metrics>,
    queue: Arc<LineQueue>,
    path: std::path::PathBuf,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        sleep_interruptible(interval, &shutdown);
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let snapshot = metrics.snapshot(queue.len() as u64);
        if let Err(e) = snapshot.write_to(&path) {
            warn!("stats write failed: {}", e);
        }
    }
}

/// Sleep up to `total`, waking early once `shutdown` is raised.
pub fn sleep_interruptible(total: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + total;
    while !shutdown.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(SHUTDOWN_CHECK_STEP));
    }
}

#[cfg(test)]
#[path = "workers_tests.rs"]
mod tests;
