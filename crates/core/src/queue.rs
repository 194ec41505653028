// SPDX-License-Identifier: MIT

//! Blocking concurrent line queue between the ingest loop and the
//! push worker
//!
//! Unbounded multi-producer/multi-consumer FIFO over a mutex and
//! condition variable. Shutdown never discards queued items: consumers
//! see `None` only once the queue is both shut down and empty, which
//! guarantees a full drain of everything pushed beforehand.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

#[derive(Default)]
struct QueueState {
    items: VecDeque<String>,
    shutdown: bool,
}

/// Blocking FIFO of raw log lines with a shutdown signal
#[derive(Default)]
pub struct LineQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl LineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line and wake one waiting consumer.
    ///
    /// Lines pushed after shutdown are still enqueued and drained.
    pub fn push(&self, line: String) {
        {
            let mut state = self.lock();
            state.items.push_back(line);
        }
        self.available.notify_one();
    }

    /// Block until a line is available or shutdown is signaled.
    ///
    /// Returns `None` only once shutdown is set *and* the queue is
    /// empty.
    pub fn pop(&self) -> Option<String> {
        let mut state = self.lock();
        while state.items.is_empty() && !state.shutdown {
            state = match self.available.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        state.items.pop_front()
    }

    /// Signal shutdown and wake all waiters. Idempotent; queued items
    /// are kept for draining.
    pub fn shutdown(&self) {
        {
            let mut state = self.lock();
            state.shutdown = true;
        }
        self.available.notify_all();
    }

    /// Current number of queued lines
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
