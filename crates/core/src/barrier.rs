// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epochs and checkpoint barriers

use serde::{Deserialize, Serialize};

/// Checkpoint id tagging log slices. Monotonically increasing; advances with
/// each checkpoint barrier. Once the coordinator reports epoch `e` complete,
/// every slice with id `< e` is reclaimable.
pub type Epoch = u64;

/// The barrier that closes an epoch on a channel.
///
/// Runtime-provided and intercepted by the record writer, which stores it so
/// replay can re-emit the exact barrier after the records of its epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointBarrier {
    pub id: Epoch,
    pub timestamp_ms: u64,
}

impl CheckpointBarrier {
    pub fn new(id: Epoch, timestamp_ms: u64) -> Self {
        Self { id, timestamp_ms }
    }
}

impl std::fmt::Display for CheckpointBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "barrier(ckpt={}, ts={})", self.id, self.timestamp_ms)
    }
}
