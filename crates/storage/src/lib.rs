// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable storage for the forwarder: a crash-safe write-ahead log
//! used as a delivery retry buffer.

pub mod wal;

pub use wal::{Wal, WalError};
