//! Shared harness for the behavioral specs.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use tempfile::TempDir;

/// A scratch data directory plus a preconfigured `logshipd` command.
pub struct Ship {
    dir: TempDir,
}

impl Ship {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.path("logship.wal")
    }

    /// The binary with a clean environment, pointed at the scratch
    /// directory and with a short drain window so specs stay fast.
    pub fn logshipd(&self) -> Command {
        self.logshipd_drain(1)
    }

    /// Same, with an explicit drain window in seconds.
    pub fn logshipd_drain(&self, secs: u64) -> Command {
        let mut cmd = bare_logshipd();
        cmd.arg("--data-dir").arg(self.dir.path());
        cmd.arg("--drain-max-wait").arg(secs.to_string());
        cmd
    }
}

/// The binary with ambient `LOGSHIP_*` configuration scrubbed.
pub fn bare_logshipd() -> Command {
    let mut cmd = Command::cargo_bin("logshipd").unwrap();
    for (key, _) in std::env::vars() {
        if key.starts_with("LOGSHIP_") {
            cmd.env_remove(key);
        }
    }
    cmd.timeout(Duration::from_secs(30));
    cmd
}

/// Decode the retry log's length-prefixed frames. Missing file means
/// no backlog.
pub fn read_frames(path: &Path) -> Vec<Vec<u8>> {
    let Ok(data) = std::fs::read(path) else {
        return Vec::new();
    };
    let mut frames = Vec::new();
    let mut at = 0usize;
    while at + 4 <= data.len() {
        let len =
            u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as usize;
        at += 4;
        if len == 0 || at + len > data.len() {
            break;
        }
        frames.push(data[at..at + len].to_vec());
        at += len;
    }
    frames
}

/// An address nothing listens on.
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/push", addr)
}

/// Minimal push endpoint: accepts up to `expect` requests, answers
/// each with `status`, and hands back what it saw.
pub struct SinkServer {
    pub url: String,
    handle: JoinHandle<Vec<(String, Vec<u8>)>>,
}

impl SinkServer {
    pub fn start(status: u16, expect: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let url = format!("http://{}/push", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let mut seen = Vec::new();
            let deadline = Instant::now() + Duration::from_secs(20);
            while seen.len() < expect && Instant::now() < deadline {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        stream.set_nonblocking(false).unwrap();
                        stream
                            .set_read_timeout(Some(Duration::from_secs(2)))
                            .unwrap();
                        if let Some(request) = read_request(&mut stream) {
                            respond(&mut stream, status);
                            seen.push(request);
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
            seen
        });
        Self { url, handle }
    }

    /// Join the server thread and return `(head, body)` per request.
    pub fn finish(self) -> Vec<(String, Vec<u8>)> {
        self.handle.join().unwrap()
    }
}

fn read_request(stream: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some((head, body))
}

fn respond(stream: &mut TcpStream, status: u16) {
    let reason = match status {
        204 => "No Content",
        503 => "Service Unavailable",
        _ => "OK",
    };
    let _ = write!(
        stream,
        "HTTP/1.1 {} {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        status, reason
    );
    let _ = stream.flush();
}

/// Fluent assertions over finished commands, shared by all specs.
pub trait AssertExt {
    fn stdout_has(self, needle: &str) -> Self;
    fn stderr_has(self, needle: &str) -> Self;
}

impl AssertExt for assert_cmd::assert::Assert {
    fn stdout_has(self, needle: &str) -> Self {
        let stdout = String::from_utf8_lossy(&self.get_output().stdout).into_owned();
        assert!(
            stdout.contains(needle),
            "stdout missing {:?}:\n{}",
            needle,
            stdout
        );
        self
    }

    fn stderr_has(self, needle: &str) -> Self {
        let stderr = String::from_utf8_lossy(&self.get_output().stderr).into_owned();
        assert!(
            stderr.contains(needle),
            "stderr missing {:?}:\n{}",
            needle,
            stderr
        );
        self
    }
}
