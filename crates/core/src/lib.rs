// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! logship-core: Core library for the logship forwarding agent
//!
//! This crate provides:
//! - The blocking concurrent line queue between ingest and push
//! - Immutable runtime configuration
//! - Thread-safe delivery counters and stats snapshots
//! - Process-id resolution against an external snapshot file
//! - Push payload and annotate-record construction
//! - The sink capability (trait + blocking HTTP implementation)

pub mod config;
pub mod metrics;
pub mod payload;
pub mod pidmap;
pub mod queue;
pub mod sink;

// Re-exports
pub use config::{Config, ConfigError, Overrides};
pub use metrics::{Metrics, MetricsSnapshot};
pub use payload::{build_push_payload, unix_nanos, AnnotatedRecord, StreamLabels};
pub use pidmap::{extract_pid, ProcessTable, UNKNOWN_PROCESS};
pub use queue::LineQueue;
pub use sink::{HttpSink, Sink, SinkError};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use sink::FakeSink;
