// SPDX-License-Identifier: MIT

//! Delivery counters and periodic stats snapshots
//!
//! Counters are lock-free relaxed atomics: exact cross-thread
//! interleaving is not a correctness concern, only eventual
//! consistency of exported snapshots. Snapshot files are written as
//! `name value` lines via a temp file and an atomic rename, so a
//! scraper never observes a half-written file.

use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counters incremented by the workers
#[derive(Debug, Default)]
pub struct Metrics {
    pub lines_ingested: AtomicU64,
    pub pushed: AtomicU64,
    pub push_errors: AtomicU64,
    pub wal_appended: AtomicU64,
    pub wal_append_errors: AtomicU64,
    pub wal_replayed: AtomicU64,
    pub replay_errors: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time copy of all counters
    pub fn snapshot(&self, queue_depth: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_ingested: self.lines_ingested.load(Ordering::Relaxed),
            pushed: self.pushed.load(Ordering::Relaxed),
            push_errors: self.push_errors.load(Ordering::Relaxed),
            wal_appended: self.wal_appended.load(Ordering::Relaxed),
            wal_append_errors: self.wal_append_errors.load(Ordering::Relaxed),
            wal_replayed: self.wal_replayed.load(Ordering::Relaxed),
            replay_errors: self.replay_errors.load(Ordering::Relaxed),
            queue_depth,
        }
    }
}

/// Exported point-in-time view of the forwarder's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub lines_ingested: u64,
    pub pushed: u64,
    pub push_errors: u64,
    pub wal_appended: u64,
    pub wal_append_errors: u64,
    pub wal_replayed: u64,
    pub replay_errors: u64,
    pub queue_depth: u64,
}

impl MetricsSnapshot {
    /// Render as `name value` lines
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let fields = [
            ("logship_lines_ingested_total", self.lines_ingested),
            ("logship_pushed_total", self.pushed),
            ("logship_push_errors_total", self.push_errors),
            ("logship_wal_appended_total", self.wal_appended),
            ("logship_wal_append_errors_total", self.wal_append_errors),
            ("logship_wal_replayed_total", self.wal_replayed),
            ("logship_replay_errors_total", self.replay_errors),
            ("logship_queue_depth", self.queue_depth),
        ];
        for (name, value) in fields {
            // Writing to a String cannot fail
            let _ = writeln!(out, "{} {}", name, value);
        }
        out
    }

    /// Write the snapshot to `path` via temp-file-then-rename
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        std::fs::write(&tmp, self.to_text())?;
        std::fs::rename(&tmp, path)
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
