// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task facade over one in-flight log per subpartition.
//!
//! Tracks the current epoch and the exact barrier that closed each epoch on
//! each channel, so replay can reproduce records-then-barrier emission order
//! byte-identically.

use crate::log::SubpartitionInFlightLog;
use crate::InFlightError;
use causeway_core::{CheckpointBarrier, Epoch, Record};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Records before the first barrier belong to the first checkpoint.
const INITIAL_EPOCH: Epoch = 1;

pub struct InFlightLogger<R: Record> {
    logs: Vec<SubpartitionInFlightLog<R>>,
    barriers: Mutex<HashMap<(u32, Epoch), CheckpointBarrier>>,
    current_epoch: AtomicU64,
}

impl<R: Record> InFlightLogger<R> {
    pub fn new(num_subpartitions: usize) -> Self {
        Self {
            logs: (0..num_subpartitions).map(|_| SubpartitionInFlightLog::new()).collect(),
            barriers: Mutex::new(HashMap::new()),
            current_epoch: AtomicU64::new(INITIAL_EPOCH),
        }
    }

    pub fn num_subpartitions(&self) -> usize {
        self.logs.len()
    }

    pub fn current_epoch(&self) -> Epoch {
        self.current_epoch.load(Ordering::Acquire)
    }

    /// Append a record to one subpartition under the current epoch.
    pub fn log_record(&self, record: R, sub: u32) -> Result<(), InFlightError> {
        let epoch = self.current_epoch();
        self.log_for(sub)?.log(record, epoch)
    }

    /// Record the barrier closing the current epoch on every subpartition and
    /// advance to the epoch that follows it.
    pub fn log_checkpoint_barrier(&self, barrier: CheckpointBarrier) {
        let mut barriers = self.barriers.lock();
        for sub in 0..self.logs.len() as u32 {
            barriers.insert((sub, barrier.id), barrier);
        }
        drop(barriers);
        self.current_epoch.store(barrier.id + 1, Ordering::Release);
        debug!(checkpoint = barrier.id, "barrier logged, epoch advanced");
    }

    /// Sorted epoch ids later than `downstream_last_seen` with retained state
    /// (records or a barrier) on `sub`.
    pub fn checkpoint_ids_to_replay(
        &self,
        sub: u32,
        downstream_last_seen: Epoch,
    ) -> Result<Vec<Epoch>, InFlightError> {
        let mut epochs = self.log_for(sub)?.epochs();
        let barriers = self.barriers.lock();
        epochs.extend(barriers.keys().filter(|(s, _)| *s == sub).map(|(_, e)| *e));
        epochs.retain(|&e| e > downstream_last_seen);
        epochs.sort_unstable();
        epochs.dedup();
        Ok(epochs)
    }

    /// The records logged for `(sub, epoch)` in exact append order.
    pub fn replay_log(&self, sub: u32, epoch: Epoch) -> Result<Vec<R>, InFlightError> {
        Ok(self.log_for(sub)?.records_of(epoch))
    }

    /// The barrier that closed `epoch` on `sub`, if one was logged.
    pub fn checkpoint_barrier(
        &self,
        sub: u32,
        epoch: Epoch,
    ) -> Result<Option<CheckpointBarrier>, InFlightError> {
        self.log_for(sub)?; // validate the address
        Ok(self.barriers.lock().get(&(sub, epoch)).copied())
    }

    /// Direct access to one subpartition's log (replay iterators, tests).
    pub fn log_for(&self, sub: u32) -> Result<&SubpartitionInFlightLog<R>, InFlightError> {
        self.logs.get(sub as usize).ok_or(InFlightError::UnknownSubpartition {
            sub,
            count: self.logs.len(),
        })
    }

    /// Reclaim every slice and barrier below `epoch` on all subpartitions.
    pub fn notify_checkpoint_complete(&self, epoch: Epoch) {
        for log in &self.logs {
            log.notify_checkpoint_complete(epoch);
        }
        self.barriers.lock().retain(|(_, e), _| *e >= epoch);
    }

    pub fn stats(&self) -> InFlightStats {
        InFlightStats {
            current_epoch: self.current_epoch(),
            records_per_subpartition: self.logs.iter().map(SubpartitionInFlightLog::len).collect(),
        }
    }
}

/// Serializable occupancy snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InFlightStats {
    pub current_epoch: Epoch,
    pub records_per_subpartition: Vec<usize>,
}

impl InFlightStats {
    pub fn total_records(&self) -> usize {
        self.records_per_subpartition.iter().sum()
    }
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod tests;
