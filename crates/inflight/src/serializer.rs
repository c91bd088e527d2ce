// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serializes typed records into runs of pool segments.
//!
//! Full segments are handed back complete for sending; the partial tail
//! stays open as the current builder until the next record, a flush, or a
//! replay preparation clears it.

use crate::InFlightError;
use bytes::BytesMut;
use causeway_core::{BufferHandle, BufferPool, Record};
use std::marker::PhantomData;
use tracing::warn;

pub struct RecordSerializer<R: Record> {
    pool: BufferPool,
    current: Option<BufferHandle>,
    _record: PhantomData<fn(R)>,
}

impl<R: Record> RecordSerializer<R> {
    pub fn new(pool: BufferPool) -> Self {
        Self { pool, current: None, _record: PhantomData }
    }

    /// Encode `record` into pool segments. Segments filled to capacity are
    /// returned for sending; a partial tail is kept as the open builder.
    pub fn serialize(&mut self, record: &R) -> Result<Vec<BufferHandle>, InFlightError> {
        let mut encoded = BytesMut::new();
        record.encode(&mut encoded);

        let mut completed = Vec::new();
        let mut rest = &encoded[..];
        while !rest.is_empty() {
            let builder = match &self.current {
                Some(handle) => handle.clone(),
                None => {
                    let handle = self.pool.request()?;
                    self.current = Some(handle.clone());
                    handle
                }
            };
            let written = builder.append(rest)?;
            rest = &rest[written..];
            if builder.remaining() == 0 {
                completed.push(builder);
                self.current = None;
            }
        }
        Ok(completed)
    }

    /// Close and return the open builder, if it holds any bytes.
    pub fn finish_current(&mut self) -> Option<BufferHandle> {
        let handle = self.current.take()?;
        if handle.is_empty() {
            // Nothing written: recycle instead of emitting an empty buffer.
            if let Err(err) = handle.recycle() {
                warn!(%err, "failed to recycle empty builder");
            }
            return None;
        }
        Some(handle)
    }

    /// Discard the open builder without emitting, releasing its segment.
    pub fn clear(&mut self) {
        if let Some(handle) = self.current.take() {
            if let Err(err) = handle.recycle() {
                warn!(%err, "failed to recycle cleared builder");
            }
        }
    }

    /// Bytes sitting in the open builder.
    pub fn pending_len(&self) -> usize {
        self.current.as_ref().map_or(0, BufferHandle::len)
    }
}

impl<R: Record> Drop for RecordSerializer<R> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
#[path = "serializer_tests.rs"]
mod tests;
