// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-writer / multi-reader epoch-sliced append-only byte log.
//!
//! Bytes live in pool segments chained per epoch. One lock guards the slice
//! map, consumer cursors, and reclamation. Readers plan their copy ranges and
//! retain the segments under the lock, copy outside it, and recycle after the
//! copy, so reclamation can never free a segment mid-read and appends are
//! never blocked for the duration of a copy.

use crate::delta::ThreadLogDelta;
use bytes::Bytes;
use causeway_core::{BufferError, BufferHandle, BufferPool, ConsumerId, Epoch};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from causal log operations.
#[derive(Debug, Error)]
pub enum CausalLogError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// Appends must not go backwards in epoch.
    #[error("append to epoch {epoch} behind current epoch {current}")]
    EpochRegression { epoch: Epoch, current: Epoch },
}

/// Consumer read position: the epoch being read and the byte offset within
/// that epoch's slice.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    epoch: Epoch,
    offset: usize,
}

struct EpochSlice {
    handles: Vec<BufferHandle>,
    /// Written length per handle, maintained at append time so read planning
    /// never touches segment data locks.
    lens: Vec<usize>,
    total: usize,
}

impl EpochSlice {
    fn new() -> Self {
        Self { handles: Vec::new(), lens: Vec::new(), total: 0 }
    }
}

/// A planned copy: segment, intra-segment range, retained before the lock
/// drops.
struct CopyPlan {
    handle: BufferHandle,
    start: usize,
    len: usize,
}

struct Inner {
    slices: BTreeMap<Epoch, EpochSlice>,
    current_epoch: Epoch,
    /// Epochs below this have been reclaimed; cursors behind it snap forward.
    earliest_retained: Epoch,
    cursors: HashMap<ConsumerId, Cursor>,
}

/// Append-only encoded-determinant log for one logical thread (the vertex
/// main thread or one subpartition), sliced by epoch.
pub struct ThreadCausalLog {
    pool: BufferPool,
    inner: Mutex<Inner>,
}

impl ThreadCausalLog {
    pub fn new(pool: BufferPool) -> Self {
        Self {
            pool,
            inner: Mutex::new(Inner {
                slices: BTreeMap::new(),
                current_epoch: 0,
                earliest_retained: 0,
                cursors: HashMap::new(),
            }),
        }
    }

    /// Append encoded bytes under `epoch`.
    ///
    /// `epoch` must be at or ahead of the current epoch; a later epoch opens
    /// a new slice lazily. Pool exhaustion propagates as backpressure.
    pub fn append(&self, bytes: &[u8], epoch: Epoch) -> Result<(), CausalLogError> {
        let mut inner = self.inner.lock();
        if epoch < inner.current_epoch {
            return Err(CausalLogError::EpochRegression { epoch, current: inner.current_epoch });
        }
        inner.current_epoch = epoch;

        let pool = &self.pool;
        let slice = inner.slices.entry(epoch).or_insert_with(EpochSlice::new);
        let mut rest = bytes;
        while !rest.is_empty() {
            let need_segment = match (slice.handles.last(), slice.lens.last()) {
                (Some(h), Some(&len)) => len == h.capacity(),
                _ => true,
            };
            if need_segment {
                slice.handles.push(pool.request()?);
                slice.lens.push(0);
            }
            let tail = slice.handles.len() - 1;
            let written = slice.handles[tail].append(rest)?;
            slice.lens[tail] += written;
            slice.total += written;
            rest = &rest[written..];
        }
        Ok(())
    }

    /// Concatenation of all slices with epoch `>= start_epoch`, in a freshly
    /// allocated buffer. Zero-length is valid. Idempotent on an unchanged log.
    pub fn determinants_from(&self, start_epoch: Epoch) -> Result<Bytes, CausalLogError> {
        let plans = {
            let inner = self.inner.lock();
            Self::plan_range(&inner, start_epoch, 0)?
        };
        Self::execute_plans(plans)
    }

    /// Bytes unread by `consumer`, starting no earlier than `epoch`, and
    /// advance the consumer's cursor to the tail.
    ///
    /// A cursor stranded in a reclaimed epoch snaps forward to the earliest
    /// retained epoch with a warning; the consumer loses nothing it could
    /// still have read.
    pub fn next_for_consumer(
        &self,
        consumer: ConsumerId,
        epoch: Epoch,
    ) -> Result<ThreadLogDelta, CausalLogError> {
        let (plans, start_offset) = {
            let mut inner = self.inner.lock();
            let earliest = inner.earliest_retained;
            let current = inner.current_epoch;
            let cursor =
                *inner.cursors.entry(consumer).or_insert(Cursor { epoch, offset: 0 });

            let mut start = cursor;
            if start.epoch < earliest {
                warn!(
                    consumer = %consumer,
                    cursor_epoch = start.epoch,
                    earliest_retained = earliest,
                    "consumer cursor predates reclaimed epoch, snapping forward"
                );
                start = Cursor { epoch: earliest, offset: 0 };
            }
            if start.epoch < epoch {
                start = Cursor { epoch, offset: 0 };
            }

            let plans = Self::plan_range(&inner, start.epoch, start.offset)?;

            // Advance to the tail: the last retained epoch and its length.
            let tail = inner
                .slices
                .iter()
                .next_back()
                .map(|(&e, s)| Cursor { epoch: e, offset: s.total })
                .unwrap_or(Cursor { epoch: current, offset: 0 });
            inner.cursors.insert(consumer, tail.max_against(start));

            (plans, start.offset)
        };
        let bytes = Self::execute_plans(plans)?;
        debug!(consumer = %consumer, bytes = bytes.len(), "consumer delta");
        Ok(ThreadLogDelta::new(bytes, start_offset as u32))
    }

    /// Reclaim and recycle all slices strictly below `epoch`. Idempotent.
    ///
    /// Every handle of a reclaimed slice is recycled exactly once (the log's
    /// own reference); readers hold their own retains and are unaffected.
    pub fn notify_checkpoint_complete(&self, epoch: Epoch) -> Result<(), CausalLogError> {
        let mut inner = self.inner.lock();
        if epoch <= inner.earliest_retained {
            return Ok(());
        }
        let retained = inner.slices.split_off(&epoch);
        let reclaimed = std::mem::replace(&mut inner.slices, retained);
        inner.earliest_retained = epoch;
        drop(inner);

        let mut first_err = None;
        for (e, slice) in reclaimed {
            debug!(epoch = e, bytes = slice.total, "reclaiming epoch slice");
            for handle in slice.handles {
                if let Err(err) = handle.recycle() {
                    warn!(epoch = e, %err, "failed to recycle reclaimed segment");
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Total retained byte count.
    pub fn len(&self) -> usize {
        self.inner.lock().slices.values().map(|s| s.total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current_epoch(&self) -> Epoch {
        self.inner.lock().current_epoch
    }

    pub fn earliest_retained_epoch(&self) -> Epoch {
        self.inner.lock().earliest_retained
    }

    /// Plan retained copy ranges for `[start_epoch, tail]`, skipping the
    /// first `skip` bytes of the starting epoch. Retains every planned
    /// segment; the caller copies and recycles outside the lock.
    fn plan_range(
        inner: &Inner,
        start_epoch: Epoch,
        skip: usize,
    ) -> Result<Vec<CopyPlan>, CausalLogError> {
        let mut plans: Vec<CopyPlan> = Vec::new();
        let retain_all = |plans: &[CopyPlan]| -> Result<(), BufferError> {
            // Roll back prior retains if one fails mid-way.
            for (i, plan) in plans.iter().enumerate() {
                if let Err(err) = plan.handle.retain() {
                    for done in &plans[..i] {
                        let _ = done.handle.recycle();
                    }
                    return Err(err);
                }
            }
            Ok(())
        };

        for (&epoch, slice) in inner.slices.range(start_epoch..) {
            let mut skip_left = if epoch == start_epoch { skip } else { 0 };
            for (handle, &len) in slice.handles.iter().zip(&slice.lens) {
                if skip_left >= len {
                    skip_left -= len;
                    continue;
                }
                plans.push(CopyPlan {
                    handle: handle.clone(),
                    start: skip_left,
                    len: len - skip_left,
                });
                skip_left = 0;
            }
        }
        retain_all(&plans)?;
        Ok(plans)
    }

    fn execute_plans(plans: Vec<CopyPlan>) -> Result<Bytes, CausalLogError> {
        let mut out = Vec::with_capacity(plans.iter().map(|p| p.len).sum());
        let mut first_err = None;
        for plan in &plans {
            match plan.handle.slice(plan.start, plan.len) {
                Ok(chunk) => out.extend_from_slice(&chunk),
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        for plan in &plans {
            if let Err(err) = plan.handle.recycle() {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err.into()),
            None => Ok(Bytes::from(out)),
        }
    }
}

impl Cursor {
    /// The tail may be behind `start` when the log is empty past the start;
    /// never move a cursor backwards.
    fn max_against(self, start: Cursor) -> Cursor {
        if (self.epoch, self.offset) >= (start.epoch, start.offset) {
            self
        } else {
            start
        }
    }
}

#[cfg(test)]
#[path = "thread_log_tests.rs"]
mod tests;
