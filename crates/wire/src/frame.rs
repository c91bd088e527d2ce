// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed framing for event streams.
//!
//! 4-byte big-endian length prefix followed by the encoded event.

use crate::event::RecoveryEvent;
use crate::WireError;
use bytes::Bytes;
use std::io::{Read, Write};

/// Frames above this are rejected before allocation.
pub(crate) const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Write one length-prefixed event.
pub fn write_event<W: Write>(writer: &mut W, event: &RecoveryEvent) -> Result<(), WireError> {
    let payload = event.encode();
    if payload.len() > MAX_FRAME_LEN {
        return Err(WireError::OversizedFrame(payload.len()));
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one length-prefixed event.
pub fn read_event<R: Read>(reader: &mut R) -> Result<RecoveryEvent, WireError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::OversizedFrame(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    let mut cursor = Bytes::from(payload);
    RecoveryEvent::decode(&mut cursor)
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
