// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recycled buffer arena shared by the causal and in-flight logs.
//!
//! The pool owns a fixed set of fixed-capacity segments. A [`BufferHandle`]
//! names a segment by `(index, generation)` and carries no ownership of its
//! own: callers `retain` before reading and `recycle` when done, and the
//! segment returns to the free list when the count reaches zero. A handle
//! whose generation no longer matches the segment has outlived a full
//! release; `retain`/`recycle` through it reports [`BufferError::StaleHandle`]
//! instead of corrupting the new occupant.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors from pool and handle operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// The pool has no free segment. Callers on the hot path treat this as
    /// backpressure; `request_blocking` waits instead.
    #[error("buffer pool exhausted ({segments} segments, all in use)")]
    Exhausted { segments: usize },

    /// The handle refers to a segment that has since been released and
    /// possibly reissued. Double-recycle and retain-after-release land here.
    #[error("stale buffer handle for segment {index} (generation {held} vs {current})")]
    StaleHandle { index: u32, held: u32, current: u32 },

    /// Write past the fixed segment capacity.
    #[error("segment {index} full ({capacity} bytes)")]
    SegmentFull { index: u32, capacity: usize },
}

struct Segment {
    refs: AtomicU32,
    generation: AtomicU32,
    data: Mutex<Vec<u8>>,
}

struct PoolShared {
    segments: Vec<Segment>,
    capacity: usize,
    free: Mutex<VecDeque<u32>>,
    freed: Condvar,
}

/// Arena of fixed-capacity, reference-counted memory segments.
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    /// Create a pool of `segment_count` segments of `segment_capacity` bytes.
    pub fn new(segment_count: usize, segment_capacity: usize) -> Self {
        let segments = (0..segment_count)
            .map(|_| Segment {
                refs: AtomicU32::new(0),
                generation: AtomicU32::new(0),
                data: Mutex::new(Vec::with_capacity(segment_capacity)),
            })
            .collect();
        Self {
            shared: Arc::new(PoolShared {
                segments,
                capacity: segment_capacity,
                free: Mutex::new((0..segment_count as u32).collect()),
                freed: Condvar::new(),
            }),
        }
    }

    /// Take a free segment, or report exhaustion.
    ///
    /// The returned handle starts with a reference count of one (the
    /// requester's retain).
    pub fn request(&self) -> Result<BufferHandle, BufferError> {
        let index = self.shared.free.lock().pop_front().ok_or(BufferError::Exhausted {
            segments: self.shared.segments.len(),
        })?;
        Ok(self.issue(index))
    }

    /// Take a free segment, waiting until one is recycled if necessary.
    pub fn request_blocking(&self) -> BufferHandle {
        let mut free = self.shared.free.lock();
        loop {
            if let Some(index) = free.pop_front() {
                drop(free);
                return self.issue(index);
            }
            self.shared.freed.wait(&mut free);
        }
    }

    fn issue(&self, index: u32) -> BufferHandle {
        let seg = &self.shared.segments[index as usize];
        seg.data.lock().clear();
        seg.refs.store(1, Ordering::Release);
        BufferHandle {
            shared: Arc::clone(&self.shared),
            index,
            generation: seg.generation.load(Ordering::Acquire),
        }
    }

    /// Number of segments currently on the free list.
    pub fn available(&self) -> usize {
        self.shared.free.lock().len()
    }

    /// Number of segments currently held by at least one reference.
    pub fn in_use(&self) -> usize {
        self.shared.segments.len() - self.available()
    }

    /// Fixed per-segment capacity in bytes.
    pub fn segment_capacity(&self) -> usize {
        self.shared.capacity
    }
}

/// Reference to one pool segment.
///
/// Cloning the handle copies the reference without touching the count;
/// ownership is expressed only through explicit [`retain`](Self::retain) and
/// [`recycle`](Self::recycle) calls, matching the transport's zero-copy
/// contract.
#[derive(Clone)]
pub struct BufferHandle {
    shared: Arc<PoolShared>,
    index: u32,
    generation: u32,
}

impl BufferHandle {
    fn segment(&self) -> &Segment {
        &self.shared.segments[self.index as usize]
    }

    fn check_live(&self) -> Result<&Segment, BufferError> {
        let seg = self.segment();
        let current = seg.generation.load(Ordering::Acquire);
        if current != self.generation {
            return Err(BufferError::StaleHandle {
                index: self.index,
                held: self.generation,
                current,
            });
        }
        Ok(seg)
    }

    /// Increment the reference count.
    pub fn retain(&self) -> Result<(), BufferError> {
        let seg = self.check_live()?;
        seg.refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n == 0 {
                    None
                } else {
                    n.checked_add(1)
                }
            })
            .map(|_| ())
            .map_err(|_| BufferError::StaleHandle {
                index: self.index,
                held: self.generation,
                current: seg.generation.load(Ordering::Acquire),
            })
    }

    /// Decrement the reference count, releasing the segment at zero.
    ///
    /// Release bumps the segment generation, so any handle still naming the
    /// old generation becomes stale rather than aliasing the next occupant.
    pub fn recycle(&self) -> Result<(), BufferError> {
        let seg = self.check_live()?;
        let prev = seg
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map_err(|_| BufferError::StaleHandle {
                index: self.index,
                held: self.generation,
                current: seg.generation.load(Ordering::Acquire),
            })?;
        if prev == 1 {
            seg.generation.fetch_add(1, Ordering::AcqRel);
            self.shared.free.lock().push_back(self.index);
            self.shared.freed.notify_one();
        }
        Ok(())
    }

    /// Append bytes, bounded by remaining capacity. Returns bytes written.
    pub fn append(&self, bytes: &[u8]) -> Result<usize, BufferError> {
        let seg = self.check_live()?;
        let mut data = seg.data.lock();
        let room = self.shared.capacity - data.len();
        if room == 0 && !bytes.is_empty() {
            return Err(BufferError::SegmentFull {
                index: self.index,
                capacity: self.shared.capacity,
            });
        }
        let n = bytes.len().min(room);
        data.extend_from_slice(&bytes[..n]);
        Ok(n)
    }

    /// Copy `len` bytes starting at `offset` out of the segment.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Vec<u8>, BufferError> {
        let seg = self.check_live()?;
        let data = seg.data.lock();
        let end = offset.saturating_add(len).min(data.len());
        Ok(data[offset.min(data.len())..end].to_vec())
    }

    /// Append the segment's written bytes onto `out`.
    pub fn copy_into(&self, out: &mut Vec<u8>) -> Result<(), BufferError> {
        let seg = self.check_live()?;
        out.extend_from_slice(&seg.data.lock());
        Ok(())
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.segment().data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity of the segment.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Remaining writable bytes.
    pub fn remaining(&self) -> usize {
        self.shared.capacity - self.len()
    }

    /// Current reference count. Zero means the segment has been released.
    pub fn ref_count(&self) -> u32 {
        if self.segment().generation.load(Ordering::Acquire) != self.generation {
            return 0;
        }
        self.segment().refs.load(Ordering::Acquire)
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl std::fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferHandle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
