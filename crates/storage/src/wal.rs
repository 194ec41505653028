// SPDX-License-Identifier: MIT

//! Write-ahead log used as a durable delivery retry buffer
//!
//! Records are framed as a 4-byte little-endian length followed by the
//! payload bytes. Consumption progress is persisted as a single `u64`
//! byte offset in a sidecar commit file, so a crash between an append
//! and the offset advance re-delivers that record: the log chooses
//! at-least-once over at-most-once.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

const LEN_PREFIX: usize = 4;
const COMMIT_LEN: usize = 8;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("record of {0} bytes exceeds the u32 length prefix")]
    RecordTooLarge(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crash-safe append-only record log with a persisted commit offset.
///
/// A single mutex serializes append, replay and clear, so replay and
/// append never interleave mid-record.
pub struct Wal {
    inner: Mutex<WalInner>,
}

struct WalInner {
    file: File,
    wal_path: PathBuf,
    commit_path: PathBuf,
    fsync: bool,
    pending_replay: bool,
    // Whether this log ever held a record, at open or since
    ever_buffered: bool,
}

impl Wal {
    /// Open or create the record file and derive the pending state
    /// from its size.
    ///
    /// With `fsync` set, every append and commit-offset store is
    /// synced to disk before returning.
    pub fn open(path: &Path, fsync: bool) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let pending_replay = file.metadata()?.len() > 0;

        Ok(Self {
            inner: Mutex::new(WalInner {
                file,
                wal_path: path.to_path_buf(),
                commit_path: Self::commit_path(path),
                fsync,
                pending_replay,
                ever_buffered: pending_replay,
            }),
        })
    }

    /// Sidecar file holding the persisted commit offset for `wal_path`
    pub fn commit_path(wal_path: &Path) -> PathBuf {
        let mut os = wal_path.as_os_str().to_os_string();
        os.push(".commit");
        PathBuf::from(os)
    }

    /// Whether undelivered records exist (O(1), mutex-guarded)
    pub fn is_replay_pending(&self) -> bool {
        self.lock().pending_replay
    }

    /// Append one record: length prefix, then the payload verbatim.
    ///
    /// A zero-length payload is a no-op. `write_all` retries partial
    /// OS writes internally, so an error here is unrecoverable for
    /// this record.
    pub fn append(&self, payload: &[u8]) -> Result<(), WalError> {
        if payload.is_empty() {
            return Ok(());
        }
        let len = u32::try_from(payload.len())
            .map_err(|_| WalError::RecordTooLarge(payload.len()))?;

        let mut inner = self.lock();
        inner.file.write_all(&len.to_le_bytes())?;
        inner.file.write_all(payload)?;
        if inner.fsync {
            inner.file.sync_all()?;
        }
        inner.pending_replay = true;
        inner.ever_buffered = true;
        Ok(())
    }

    /// Replay pending records from the persisted commit offset.
    ///
    /// Each record is handed to `consume`; `true` advances past it,
    /// `false` stops the pass immediately. The offset of the last
    /// fully-consumed record is persisted once at the end of the pass.
    /// Reaching the end of the records (or an explicit zero-length
    /// sentinel) is a full drain and implicitly clears the log. A short
    /// read stops the pass without advancing past the truncated record,
    /// leaving it pending.
    ///
    /// Returns true iff at least one record was fully consumed.
    pub fn replay<F>(&self, consume: F) -> Result<bool, WalError>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let mut inner = self.lock();
        Self::replay_locked(&mut inner, consume, false)
    }

    /// Like [`Wal::replay`], but persists the commit offset after every
    /// individual success, for stronger crash-consistency at a higher
    /// I/O cost.
    pub fn replay_single_commit<F>(&self, consume: F) -> Result<bool, WalError>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let mut inner = self.lock();
        Self::replay_locked(&mut inner, consume, true)
    }

    /// Truncate the record file, delete the commit sidecar and reset
    /// the pending flag. Idempotent on an already-empty log.
    pub fn clear(&self) -> Result<(), WalError> {
        let mut inner = self.lock();
        Self::clear_locked(&mut inner)
    }

    fn lock(&self) -> MutexGuard<'_, WalInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn replay_locked<F>(
        inner: &mut WalInner,
        mut consume: F,
        commit_each: bool,
    ) -> Result<bool, WalError>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let mut offset = load_commit(&inner.commit_path);
        let mut file = File::open(&inner.wal_path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut did_replay = false;
        let mut drained = false;
        let mut len_buf = [0u8; LEN_PREFIX];

        loop {
            let read = read_full(&mut file, &mut len_buf)?;
            if read == 0 {
                // Clean end of the record stream
                drained = true;
                break;
            }
            if read < LEN_PREFIX {
                // Truncated length prefix: stays pending
                break;
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len == 0 {
                // Drain sentinel
                drained = true;
                break;
            }

            let mut payload = vec![0u8; len];
            if read_full(&mut file, &mut payload)? < len {
                // Truncated payload: stays pending
                break;
            }

            if !consume(&payload) {
                break;
            }

            offset += (LEN_PREFIX + len) as u64;
            did_replay = true;
            if commit_each {
                store_commit(&inner.commit_path, offset, inner.fsync)?;
            }
        }

        if did_replay {
            if drained {
                Self::clear_locked(inner)?;
            } else if !commit_each {
                store_commit(&inner.commit_path, offset, inner.fsync)?;
            }
        }

        Ok(did_replay)
    }

    fn clear_locked(inner: &mut WalInner) -> Result<(), WalError> {
        inner.file.set_len(0)?;
        inner.file.seek(SeekFrom::Start(0))?;
        inner.pending_replay = false;

        match std::fs::remove_file(&inner.commit_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        debug!("wal cleared: {}", inner.wal_path.display());
        Ok(())
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        // A log that never buffered anything leaves no files behind
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !inner.ever_buffered {
            let _ = std::fs::remove_file(&inner.wal_path);
            let _ = std::fs::remove_file(&inner.commit_path);
        }
    }
}

/// Read until `buf` is full or the stream ends; returns bytes read
fn read_full(file: &mut File, buf: &mut [u8]) -> Result<usize, WalError> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Load the persisted commit offset; a missing or short commit file
/// means replay starts from the beginning.
fn load_commit(path: &Path) -> u64 {
    let mut buf = [0u8; COMMIT_LEN];
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return 0,
    };
    match read_full(&mut file, &mut buf) {
        Ok(n) if n == COMMIT_LEN => u64::from_le_bytes(buf),
        _ => 0,
    }
}

fn store_commit(path: &Path, offset: u64, fsync: bool) -> Result<(), WalError> {
    let mut file = File::create(path)?;
    file.write_all(&offset.to_le_bytes())?;
    if fsync {
        file.sync_all()?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
