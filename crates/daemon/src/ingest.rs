// SPDX-License-Identifier: MIT

//! Standard-input ingest loop.
//!
//! Reads one line at a time, forwards the verbatim bytes to the mirror
//! writer and hands the stripped line to the queue. Returns once the
//! input reaches end of file.

use std::io::{BufRead, Write};

use logship_core::{LineQueue, Metrics};
use tracing::debug;

/// Pump `input` into `queue` until end of file.
///
/// Each raw line, trailing newline included, is copied to `mirror`
/// before the line is queued. Exactly one trailing `\n` is stripped
/// from the queued copy; a `\r` before it is kept as-is. Input that is
/// not valid UTF-8 is queued lossily, while the mirror still receives
/// the original bytes.
pub fn run_ingest<R: BufRead, W: Write>(
    mut input: R,
    mirror: &mut W,
    queue: &LineQueue,
    metrics: &Metrics,
) -> std::io::Result<u64> {
    let mut buf = Vec::new();
    let mut lines = 0u64;
    loop {
        buf.clear();
        let read = input.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        if let Err(e) = mirror.write_all(&buf).and_then(|()| mirror.flush()) {
            debug!("mirror write failed: {}", e);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        queue.push(String::from_utf8_lossy(&buf).into_owned());
        Metrics::incr(&metrics.lines_ingested);
        lines += 1;
    }
    Ok(lines)
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
