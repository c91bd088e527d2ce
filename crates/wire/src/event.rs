// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery events exchanged between channel endpoints

use crate::delta_codec::{self, decode_delta, encode_delta};
use crate::WireError;
use bytes::{BufMut, Bytes, BytesMut};
use causeway_causal::VertexCausalLogDelta;
use causeway_core::{Epoch, VertexId};

const TAG_INFLIGHT_PREPARE: u8 = 0x10;
const TAG_INFLIGHT_REQUEST: u8 = 0x11;
const TAG_DETERMINANT_REQUEST: u8 = 0x12;
const TAG_DETERMINANT_RESPONSE: u8 = 0x13;

/// Events that drive replay and determinant recovery across a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryEvent {
    /// Downstream → upstream: stop normal emission on this subpartition and
    /// get ready to replay everything after `checkpoint_id`.
    InFlightLogPrepare { subpartition: u32, checkpoint_id: Epoch },

    /// Downstream → upstream: the channel is reconnected, start the replay
    /// prepared for `(subpartition, checkpoint_id)`.
    InFlightLogRequest { subpartition: u32, checkpoint_id: Epoch },

    /// Downstream → upstream: report everything known about the determinants
    /// of `failed_vertex`.
    DeterminantRequest { failed_vertex: VertexId },

    /// Upstream → downstream: one reporter's view of the failed vertex's log.
    DeterminantResponse { delta: VertexCausalLogDelta },
}

causeway_core::simple_display! {
    RecoveryEvent {
        InFlightLogPrepare { .. } => "inflight-log-prepare",
        InFlightLogRequest { .. } => "inflight-log-request",
        DeterminantRequest { .. } => "determinant-request",
        DeterminantResponse { .. } => "determinant-response",
    }
}

impl RecoveryEvent {
    pub fn encode_to(&self, out: &mut BytesMut) {
        match self {
            Self::InFlightLogPrepare { subpartition, checkpoint_id } => {
                out.put_u8(TAG_INFLIGHT_PREPARE);
                out.put_u32(*subpartition);
                out.put_u64(*checkpoint_id);
            }
            Self::InFlightLogRequest { subpartition, checkpoint_id } => {
                out.put_u8(TAG_INFLIGHT_REQUEST);
                out.put_u32(*subpartition);
                out.put_u64(*checkpoint_id);
            }
            Self::DeterminantRequest { failed_vertex } => {
                out.put_u8(TAG_DETERMINANT_REQUEST);
                out.put_u16(failed_vertex.0);
            }
            Self::DeterminantResponse { delta } => {
                out.put_u8(TAG_DETERMINANT_RESPONSE);
                encode_delta(out, delta);
            }
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::new();
        self.encode_to(&mut out);
        out.freeze()
    }

    pub fn decode(cursor: &mut Bytes) -> Result<Self, WireError> {
        let tag = delta_codec::get_u8(cursor)?;
        match tag {
            TAG_INFLIGHT_PREPARE => Ok(Self::InFlightLogPrepare {
                subpartition: delta_codec::get_u32(cursor)?,
                checkpoint_id: delta_codec::get_u64(cursor)?,
            }),
            TAG_INFLIGHT_REQUEST => Ok(Self::InFlightLogRequest {
                subpartition: delta_codec::get_u32(cursor)?,
                checkpoint_id: delta_codec::get_u64(cursor)?,
            }),
            TAG_DETERMINANT_REQUEST => Ok(Self::DeterminantRequest {
                failed_vertex: VertexId(delta_codec::get_u16(cursor)?),
            }),
            TAG_DETERMINANT_RESPONSE => {
                Ok(Self::DeterminantResponse { delta: decode_delta(cursor)? })
            }
            other => Err(WireError::UnknownEvent(other)),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
