// SPDX-License-Identifier: MIT

//! The sink capability: delivery of payload bytes to the remote
//! log-aggregation endpoint
//!
//! The core only sees `send(bytes) -> success|failure`; the blocking
//! HTTP implementation lives here behind the trait so workers can be
//! exercised against a fake.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use ureq::Agent;

/// Fixed delivery timeout for one push attempt
pub const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from a delivery attempt or sink construction
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink returned HTTP status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("cannot load CA file {path}: {reason}")]
    CaFile { path: String, reason: String },
}

/// Delivery capability for one payload
pub trait Sink: Send + Sync {
    fn send(&self, payload: &[u8]) -> Result<(), SinkError>;
}

/// Blocking HTTP sink: POST with a JSON content type, an optional
/// bearer token and an optional custom CA trust file
#[derive(Debug)]
pub struct HttpSink {
    agent: Agent,
    url: String,
    token: Option<String>,
}

impl HttpSink {
    /// Build the sink. A missing or unparsable CA file is a
    /// configuration error, reported before any line is processed.
    pub fn new(url: &str, token: Option<&str>, ca_file: Option<&Path>) -> Result<Self, SinkError> {
        let mut config = Agent::config_builder().timeout_global(Some(SEND_TIMEOUT));

        if let Some(path) = ca_file {
            let tls = ureq::tls::TlsConfig::builder()
                .root_certs(load_root_certs(path)?)
                .build();
            config = config.tls_config(tls);
        }

        Ok(Self {
            agent: config.build().into(),
            url: url.to_string(),
            token: token.map(str::to_string),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Sink for HttpSink {
    fn send(&self, payload: &[u8]) -> Result<(), SinkError> {
        let mut request = self
            .agent
            .post(&self.url)
            .header("Content-Type", "application/json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        match request.send(payload) {
            Ok(_response) => Ok(()),
            // Non-2xx statuses surface as errors by default
            Err(ureq::Error::StatusCode(code)) => Err(SinkError::Status(code)),
            Err(e) => Err(SinkError::Transport(e.to_string())),
        }
    }
}

fn load_root_certs(path: &Path) -> Result<ureq::tls::RootCerts, SinkError> {
    use ureq::tls::{parse_pem, PemItem, RootCerts};

    let ca_file = || path.display().to_string();
    let pem = std::fs::read(path).map_err(|e| SinkError::CaFile {
        path: ca_file(),
        reason: e.to_string(),
    })?;

    let mut certs = Vec::new();
    for item in parse_pem(&pem) {
        match item {
            Ok(PemItem::Certificate(cert)) => certs.push(cert.to_owned()),
            Ok(_) => {}
            Err(e) => {
                return Err(SinkError::CaFile {
                    path: ca_file(),
                    reason: e.to_string(),
                })
            }
        }
    }

    if certs.is_empty() {
        return Err(SinkError::CaFile {
            path: ca_file(),
            reason: "no certificates found".to_string(),
        });
    }

    Ok(RootCerts::new_with_certs(&certs))
}

/// Recording sink for tests: collects payloads and can be switched
/// into a failing mode.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeSink {
    sent: std::sync::Arc<std::sync::Mutex<Vec<Vec<u8>>>>,
    failing: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that refuses every payload until switched back
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// All payloads accepted so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Sink for FakeSink {
    fn send(&self, payload: &[u8]) -> Result<(), SinkError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SinkError::Transport("sink forced down".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(payload.to_vec());
        Ok(())
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
