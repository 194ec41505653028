// SPDX-License-Identifier: MIT

//! Process-id resolution against an external snapshot file
//!
//! The snapshot is a whitespace-column text file maintained by the
//! supervised server; the first four columns are
//! `running pid ppid name`. Lookups hit an in-memory cache and fall
//! back to one reload when the snapshot file changed on disk, so a
//! freshly spawned process resolves without re-reading an unchanged
//! file on every miss.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Sentinel name for pids the snapshot does not know
pub const UNKNOWN_PROCESS: &str = "unknown";

/// Longest prefix scanned for a bracketed pid
const MAX_PID_PREFIX: usize = 40;

/// Extract the leading bracketed pid from a log line
/// (`[1234:Router] ...` yields 1234).
///
/// The scan covers at most the first 40 bytes and requires at least
/// one digit before the colon.
pub fn extract_pid(line: &str) -> Option<u32> {
    let bytes = line.as_bytes();
    if bytes.first() != Some(&b'[') {
        return None;
    }

    let mut pid: u32 = 0;
    let mut digits = 0;
    for &c in bytes.iter().take(MAX_PID_PREFIX).skip(1) {
        match c {
            b':' => return (digits > 0).then_some(pid),
            b'0'..=b'9' => {
                pid = pid.checked_mul(10)?.checked_add(u32::from(c - b'0'))?;
                digits += 1;
            }
            _ => return None,
        }
    }
    // No ':' within the scanned prefix
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

/// Cached pid → process-name table backed by the snapshot file
pub struct ProcessTable {
    path: PathBuf,
    map: HashMap<u32, String>,
    loaded: Option<Fingerprint>,
}

impl ProcessTable {
    /// Create an empty table; the snapshot is read lazily on the
    /// first miss.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            map: HashMap::new(),
            loaded: None,
        }
    }

    /// Resolve a pid, reloading the snapshot once on a miss if the
    /// file changed. `None` means the caller substitutes
    /// [`UNKNOWN_PROCESS`]; resolution is never fatal.
    pub fn resolve(&mut self, pid: u32) -> Option<&str> {
        if pid != 0 && !self.map.contains_key(&pid) {
            self.reload_if_changed();
        }
        self.map.get(&pid).map(String::as_str)
    }

    /// Re-read the snapshot if its on-disk fingerprint moved.
    /// Returns whether a reload happened.
    pub fn reload_if_changed(&mut self) -> bool {
        let current = match fingerprint(&self.path) {
            Some(fp) => fp,
            None => return false,
        };
        if self.loaded == Some(current) {
            return false;
        }
        self.loaded = Some(current);

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                debug!("failed to read pid snapshot {}: {}", self.path.display(), e);
                return false;
            }
        };

        // Later entries win; existing entries for reused pids are
        // overwritten rather than the table being rebuilt.
        for line in contents.lines() {
            let mut fields = line.split_whitespace();
            let (Some(_running), Some(pid_text), Some(_ppid), Some(name)) = (
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
            ) else {
                continue;
            };
            let Ok(pid) = pid_text.parse::<u32>() else {
                continue;
            };
            self.map.insert(pid, name.to_string());
        }

        true
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn fingerprint(path: &Path) -> Option<Fingerprint> {
    let meta = std::fs::metadata(path).ok()?;
    Some(Fingerprint {
        len: meta.len(),
        modified: meta.modified().ok(),
    })
}

#[cfg(test)]
#[path = "pidmap_tests.rs"]
mod tests;
