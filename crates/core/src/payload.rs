// SPDX-License-Identifier: MIT

//! Push payload and annotate-record construction
//!
//! Pure transforms from a log line plus process metadata to the bytes
//! shipped to the sink or appended to the annotate side channel.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Static stream labels attached to every pushed line
#[derive(Debug, Clone)]
pub struct StreamLabels {
    pub job: String,
    pub host: String,
    pub namespace: String,
    pub pod: String,
}

/// Current wall-clock time as nanoseconds since the Unix epoch
pub fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Build the JSON push body for one line.
///
/// Shape:
/// `{"streams":[{"stream":{labels...,"pid","process"},"values":[["<ns>","<line>"]]}]}`
/// with `instance` mirroring `host` and the timestamp rendered as a
/// string, as the aggregation endpoint expects.
pub fn build_push_payload(
    labels: &StreamLabels,
    pid: u32,
    process: &str,
    line: &str,
    timestamp_ns: u64,
) -> Vec<u8> {
    let body = serde_json::json!({
        "streams": [{
            "stream": {
                "job": labels.job,
                "host": labels.host,
                "instance": labels.host,
                "namespace": labels.namespace,
                "pod": labels.pod,
                "pid": pid.to_string(),
                "process": process,
            },
            "values": [[timestamp_ns.to_string(), line]],
        }]
    });
    body.to_string().into_bytes()
}

/// One line of the NDJSON annotate side channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedRecord {
    pub ts: u64,
    pub pid: u64,
    pub process: String,
    pub line: String,
}

impl AnnotatedRecord {
    pub fn new(ts: u64, pid: u32, process: &str, line: &str) -> Self {
        Self {
            ts,
            pid: u64::from(pid),
            process: process.to_string(),
            line: line.to_string(),
        }
    }

    /// Serialize to a single JSON line (no trailing newline)
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
