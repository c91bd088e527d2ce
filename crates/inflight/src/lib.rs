// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! causeway-inflight: the in-flight data log and the replay-aware writer.
//!
//! Every record a task emits is retained per output subpartition, sliced by
//! epoch, until the checkpoint covering it completes. On failure the
//! downstream side sends prepare/request events and the writer re-emits the
//! retained slices (records first, then the barrier that closed each epoch)
//! through the same serialization path as the original emission.

mod log;
mod logger;
mod serializer;
mod writer;

pub use log::{ReplayIterator, SubpartitionInFlightLog};
pub use logger::{InFlightLogger, InFlightStats};
pub use serializer::RecordSerializer;
pub use writer::{BufferSink, RecordWriter, REPLAY_TIMEOUT};

use causeway_core::BufferError;
use thiserror::Error;

/// Errors from in-flight logging and replay.
#[derive(Debug, Error)]
pub enum InFlightError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// A record or event addressed a subpartition this task does not own.
    #[error("unknown subpartition {sub} (task has {count})")]
    UnknownSubpartition { sub: u32, count: usize },

    /// The in-flight listener only accepts prepare and request events.
    #[error("unexpected event on in-flight listener: {0}")]
    UnexpectedEvent(String),

    /// The transport failed to take a buffer or barrier.
    #[error("transport error: {0}")]
    Transport(String),
}
