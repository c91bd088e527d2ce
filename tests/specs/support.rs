// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: a capturing transport sink

use causeway_core::{BufferHandle, CheckpointBarrier, Epoch};
use causeway_inflight::{BufferSink, InFlightError};
use std::sync::{Arc, Mutex};

/// What the downstream side of a channel observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Bytes(Vec<u8>),
    Barrier(Epoch),
}

/// Transport stand-in: copies buffer contents, recycles the buffer as the
/// network stack would, and keeps a per-channel transcript.
#[derive(Default)]
pub struct CaptureSink {
    sent: Mutex<Vec<(u32, Observed)>>,
}

impl CaptureSink {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn transcript(&self, sub: u32) -> Vec<Observed> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == sub)
            .map(|(_, o)| o.clone())
            .collect()
    }

    pub fn byte_stream(&self, sub: u32) -> Vec<u8> {
        let mut out = Vec::new();
        for observed in self.transcript(sub) {
            if let Observed::Bytes(bytes) = observed {
                out.extend_from_slice(&bytes);
            }
        }
        out
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl BufferSink for CaptureSink {
    fn send_buffer(&self, sub: u32, buffer: BufferHandle) -> Result<(), InFlightError> {
        let mut bytes = Vec::new();
        buffer.copy_into(&mut bytes)?;
        buffer.recycle()?;
        self.sent.lock().unwrap().push((sub, Observed::Bytes(bytes)));
        Ok(())
    }

    fn send_barrier(&self, sub: u32, barrier: &CheckpointBarrier) -> Result<(), InFlightError> {
        self.sent.lock().unwrap().push((sub, Observed::Barrier(barrier.id)));
        Ok(())
    }
}
