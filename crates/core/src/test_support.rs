// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test record types shared by other crates' tests

use crate::buffer::BufferHandle;
use crate::record::Record;
use bytes::{BufMut, BytesMut};

/// Plain value record: a tag plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    pub tag: u32,
    pub payload: Vec<u8>,
}

impl TestRecord {
    pub fn new(tag: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self { tag, payload: payload.into() }
    }
}

impl Record for TestRecord {
    fn encode(&self, out: &mut BytesMut) {
        out.put_u32(self.tag);
        out.put_u32(self.payload.len() as u32);
        out.put_slice(&self.payload);
    }
}

/// Record that references a pool buffer, for lifetime-accounting tests.
#[derive(Debug, Clone)]
pub struct BufferBackedRecord {
    pub tag: u32,
    pub buffer: BufferHandle,
}

impl BufferBackedRecord {
    pub fn new(tag: u32, buffer: BufferHandle) -> Self {
        Self { tag, buffer }
    }
}

impl Record for BufferBackedRecord {
    fn encode(&self, out: &mut BytesMut) {
        out.put_u32(self.tag);
        let mut bytes = Vec::new();
        // Stale handles encode as empty; lifetime tests never hit this.
        let _ = self.buffer.copy_into(&mut bytes);
        out.put_u32(bytes.len() as u32);
        out.put_slice(&bytes);
    }

    fn backing_buffer(&self) -> Option<&BufferHandle> {
        Some(&self.buffer)
    }
}
