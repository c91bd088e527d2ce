// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Determinants: recorded nondeterministic decisions.
//!
//! A determinant captures one choice the task made that a replacement
//! instance must repeat to stay byte-equivalent: which input channel was read
//! next, when a timer fired, what the RNG produced, where the source read
//! from, which buffer was built. The variant set is closed; encodings go
//! through the [`DeterminantEncoding`] seam so the log never depends on a
//! concrete byte layout.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// One recorded nondeterministic decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Determinant {
    /// The input channel whose record was consumed next.
    Order { channel: u32 },
    /// A processing-time timer fired.
    Timer { timer_id: u64, timestamp: u64 },
    /// A random draw was made.
    Rng { seed: u64 },
    /// The source advanced to this read offset.
    Source { offset: u64 },
    /// A network buffer of `length` bytes was built for `subpartition`.
    Buffer { subpartition: u32, length: u32 },
}

crate::simple_display! {
    Determinant {
        Order { .. } => "order",
        Timer { .. } => "timer",
        Rng { .. } => "rng",
        Source { .. } => "source",
        Buffer { .. } => "buffer",
    }
}

/// Errors from determinant decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown determinant tag {0:#04x}")]
    UnknownTag(u8),

    #[error("determinant stream truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
}

/// Capability seam between the causal log and a concrete determinant layout.
///
/// `decode_next` advances the cursor and returns `Ok(None)` exactly at a
/// clean end of input; running out of bytes mid-determinant is an error.
pub trait DeterminantEncoding: Send + Sync {
    fn encode_to(&self, out: &mut BytesMut, determinant: &Determinant);

    fn decode_next(&self, cursor: &mut Bytes) -> Result<Option<Determinant>, CodecError>;

    /// Encode into a fresh byte vector.
    fn encode(&self, determinant: &Determinant) -> Bytes {
        let mut out = BytesMut::new();
        self.encode_to(&mut out, determinant);
        out.freeze()
    }
}

const TAG_ORDER: u8 = 0x01;
const TAG_TIMER: u8 = 0x02;
const TAG_RNG: u8 = 0x03;
const TAG_SOURCE: u8 = 0x04;
const TAG_BUFFER: u8 = 0x05;

/// Tag byte plus fixed-width big-endian fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactEncoding;

impl CompactEncoding {
    fn body_len(tag: u8) -> Result<usize, CodecError> {
        match tag {
            TAG_ORDER => Ok(4),
            TAG_TIMER => Ok(16),
            TAG_RNG | TAG_SOURCE => Ok(8),
            TAG_BUFFER => Ok(8),
            other => Err(CodecError::UnknownTag(other)),
        }
    }
}

impl DeterminantEncoding for CompactEncoding {
    fn encode_to(&self, out: &mut BytesMut, determinant: &Determinant) {
        match *determinant {
            Determinant::Order { channel } => {
                out.put_u8(TAG_ORDER);
                out.put_u32(channel);
            }
            Determinant::Timer { timer_id, timestamp } => {
                out.put_u8(TAG_TIMER);
                out.put_u64(timer_id);
                out.put_u64(timestamp);
            }
            Determinant::Rng { seed } => {
                out.put_u8(TAG_RNG);
                out.put_u64(seed);
            }
            Determinant::Source { offset } => {
                out.put_u8(TAG_SOURCE);
                out.put_u64(offset);
            }
            Determinant::Buffer { subpartition, length } => {
                out.put_u8(TAG_BUFFER);
                out.put_u32(subpartition);
                out.put_u32(length);
            }
        }
    }

    fn decode_next(&self, cursor: &mut Bytes) -> Result<Option<Determinant>, CodecError> {
        if !cursor.has_remaining() {
            return Ok(None);
        }
        let tag = cursor.get_u8();
        let need = Self::body_len(tag)?;
        if cursor.remaining() < need {
            return Err(CodecError::Truncated { need, have: cursor.remaining() });
        }
        let determinant = match tag {
            TAG_ORDER => Determinant::Order { channel: cursor.get_u32() },
            TAG_TIMER => Determinant::Timer {
                timer_id: cursor.get_u64(),
                timestamp: cursor.get_u64(),
            },
            TAG_RNG => Determinant::Rng { seed: cursor.get_u64() },
            TAG_SOURCE => Determinant::Source { offset: cursor.get_u64() },
            TAG_BUFFER => Determinant::Buffer {
                subpartition: cursor.get_u32(),
                length: cursor.get_u32(),
            },
            // body_len already rejected every other tag
            other => return Err(CodecError::UnknownTag(other)),
        };
        Ok(Some(determinant))
    }
}

#[cfg(test)]
#[path = "determinant_tests.rs"]
mod tests;
