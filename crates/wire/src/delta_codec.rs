// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical binary layout for vertex causal-log deltas.
//!
//! ```text
//! vertex_id:u16  main_present:u8
//! [main: offset:u32 len:u32 bytes]?
//! num_partitions:u32
//!   [partition_id: 16 bytes
//!    num_subs:u32
//!      [sub_idx:u32 offset:u32 len:u32 bytes]*
//!   ]*
//! ```
//!
//! The delta's interior maps are ordered, so equal logs always encode
//! bit-identically: partitions in lexicographic id order, subpartitions by
//! index.

use crate::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use causeway_causal::{ThreadLogDelta, VertexCausalLogDelta};
use causeway_core::{PartitionId, VertexId};

pub fn encode_delta(out: &mut BytesMut, delta: &VertexCausalLogDelta) {
    out.put_u16(delta.vertex.0);
    match &delta.main {
        Some(main) => {
            out.put_u8(1);
            put_thread_delta(out, main);
        }
        None => out.put_u8(0),
    }
    out.put_u32(delta.partitions.len() as u32);
    for (partition, subs) in &delta.partitions {
        out.put_slice(partition.as_bytes());
        out.put_u32(subs.len() as u32);
        for (&sub, d) in subs {
            out.put_u32(sub);
            put_thread_delta(out, d);
        }
    }
}

pub fn decode_delta(cursor: &mut Bytes) -> Result<VertexCausalLogDelta, WireError> {
    let vertex = VertexId(get_u16(cursor)?);
    let mut delta = VertexCausalLogDelta::empty(vertex);

    match get_u8(cursor)? {
        0 => {}
        1 => delta.main = Some(get_thread_delta(cursor)?),
        other => return Err(WireError::InvalidMarker(other)),
    }

    let num_partitions = get_u32(cursor)?;
    for _ in 0..num_partitions {
        need(cursor, 16)?;
        let mut raw = [0u8; 16];
        cursor.copy_to_slice(&mut raw);
        let partition = PartitionId::from_bytes(raw);

        let num_subs = get_u32(cursor)?;
        for _ in 0..num_subs {
            let sub = get_u32(cursor)?;
            let d = get_thread_delta(cursor)?;
            delta.insert_sub(partition, sub, d);
        }
    }
    Ok(delta)
}

fn put_thread_delta(out: &mut BytesMut, delta: &ThreadLogDelta) {
    out.put_u32(delta.start_offset);
    out.put_u32(delta.bytes.len() as u32);
    out.put_slice(&delta.bytes);
}

fn get_thread_delta(cursor: &mut Bytes) -> Result<ThreadLogDelta, WireError> {
    let start_offset = get_u32(cursor)?;
    let len = get_u32(cursor)? as usize;
    need(cursor, len)?;
    let bytes = cursor.split_to(len);
    Ok(ThreadLogDelta::new(bytes, start_offset))
}

fn need(cursor: &Bytes, need: usize) -> Result<(), WireError> {
    if cursor.remaining() < need {
        return Err(WireError::Truncated { need, have: cursor.remaining() });
    }
    Ok(())
}

pub(crate) fn get_u8(cursor: &mut Bytes) -> Result<u8, WireError> {
    need(cursor, 1)?;
    Ok(cursor.get_u8())
}

pub(crate) fn get_u16(cursor: &mut Bytes) -> Result<u16, WireError> {
    need(cursor, 2)?;
    Ok(cursor.get_u16())
}

pub(crate) fn get_u32(cursor: &mut Bytes) -> Result<u32, WireError> {
    need(cursor, 4)?;
    Ok(cursor.get_u32())
}

pub(crate) fn get_u64(cursor: &mut Bytes) -> Result<u64, WireError> {
    need(cursor, 8)?;
    Ok(cursor.get_u64())
}

#[cfg(test)]
#[path = "delta_codec_tests.rs"]
mod tests;
