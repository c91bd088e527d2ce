// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-subpartition record retention, sliced by epoch.
//!
//! The log keeps every record emitted since the last completed checkpoint.
//! A replay iterator takes a snapshot of the requested epochs and retains
//! every backing buffer in it, so neither the transport recycling buffers on
//! send nor a checkpoint completing mid-replay can free bytes the replay
//! still needs.

use crate::InFlightError;
use causeway_core::{Epoch, Record};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

struct Inner<R> {
    slices: BTreeMap<Epoch, Vec<R>>,
    earliest_retained: Epoch,
}

/// Epoch-sliced buffer of the records emitted on one output subpartition.
pub struct SubpartitionInFlightLog<R: Record> {
    inner: Mutex<Inner<R>>,
}

impl<R: Record> SubpartitionInFlightLog<R> {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { slices: BTreeMap::new(), earliest_retained: 0 }) }
    }

    /// Append a record under `epoch`, retaining its backing buffer.
    pub fn log(&self, record: R, epoch: Epoch) -> Result<(), InFlightError> {
        if let Some(buffer) = record.backing_buffer() {
            buffer.retain()?;
        }
        self.inner.lock().slices.entry(epoch).or_default().push(record);
        Ok(())
    }

    /// Bidirectional replay cursor over every record with epoch
    /// `>= start_epoch`.
    ///
    /// The iterator owns a snapshot: appends made after creation are not
    /// observed. Every backing buffer in the snapshot is retained here and
    /// recycled when the iterator drops.
    pub fn iter_from(&self, start_epoch: Epoch) -> Result<ReplayIterator<R>, InFlightError> {
        let inner = self.inner.lock();
        let mut items = Vec::new();
        for (&epoch, records) in inner.slices.range(start_epoch..) {
            for record in records {
                if let Some(buffer) = record.backing_buffer() {
                    buffer.retain()?;
                }
                items.push((epoch, record.clone()));
            }
        }
        Ok(ReplayIterator { items, pos: 0 })
    }

    /// Records of one epoch in append order, as an owned snapshot.
    pub fn records_of(&self, epoch: Epoch) -> Vec<R> {
        self.inner.lock().slices.get(&epoch).cloned().unwrap_or_default()
    }

    /// Epochs that currently hold at least one record, ascending.
    pub fn epochs(&self) -> Vec<Epoch> {
        self.inner.lock().slices.iter().filter(|(_, r)| !r.is_empty()).map(|(&e, _)| e).collect()
    }

    /// Drop and recycle every slice with epoch `< epoch`. Idempotent.
    ///
    /// Only the log's own retains are released; an outstanding iterator holds
    /// its own and stays valid.
    pub fn notify_checkpoint_complete(&self, epoch: Epoch) {
        let reclaimed = {
            let mut inner = self.inner.lock();
            if epoch <= inner.earliest_retained {
                return;
            }
            inner.earliest_retained = epoch;
            let retained = inner.slices.split_off(&epoch);
            std::mem::replace(&mut inner.slices, retained)
        };
        for (e, records) in reclaimed {
            debug!(epoch = e, records = records.len(), "reclaiming in-flight slice");
            for record in records {
                if let Some(buffer) = record.backing_buffer() {
                    if let Err(err) = buffer.recycle() {
                        warn!(epoch = e, %err, "failed to recycle in-flight buffer");
                    }
                }
            }
        }
    }

    /// Total retained record count.
    pub fn len(&self) -> usize {
        self.inner.lock().slices.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Record> Default for SubpartitionInFlightLog<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Finite bidirectional cursor over a snapshot of logged records.
///
/// Walks epochs ascending; `num_remaining` counts not-yet-returned records in
/// the forward direction. Not restartable: create a new one per replay.
pub struct ReplayIterator<R: Record> {
    items: Vec<(Epoch, R)>,
    pos: usize,
}

impl<R: Record> ReplayIterator<R> {
    pub fn has_next(&self) -> bool {
        self.pos < self.items.len()
    }

    pub fn next(&mut self) -> Option<R> {
        let (_, record) = self.items.get(self.pos)?;
        let record = record.clone();
        self.pos += 1;
        Some(record)
    }

    pub fn has_previous(&self) -> bool {
        self.pos > 0
    }

    pub fn previous(&mut self) -> Option<R> {
        if self.pos == 0 {
            return None;
        }
        self.pos -= 1;
        self.items.get(self.pos).map(|(_, r)| r.clone())
    }

    /// Exact count of records `next` has not yet returned.
    pub fn num_remaining(&self) -> usize {
        self.items.len() - self.pos
    }

    /// Epoch of the last returned record, or of the record about to be
    /// returned when nothing has been returned yet. `None` on an empty
    /// snapshot.
    pub fn current_epoch(&self) -> Option<Epoch> {
        if self.pos == 0 {
            self.items.first().map(|(e, _)| *e)
        } else {
            self.items.get(self.pos - 1).map(|(e, _)| *e)
        }
    }
}

impl<R: Record> Drop for ReplayIterator<R> {
    fn drop(&mut self) {
        for (_, record) in &self.items {
            if let Some(buffer) = record.backing_buffer() {
                if let Err(err) = buffer.recycle() {
                    warn!(%err, "failed to recycle replay-retained buffer");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
