// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delta transmission: sender log → wire → receiver mirror

use bytes::BytesMut;
use causeway_causal::{JobCausalLog, VertexCausalLog};
use causeway_core::{BufferPool, CompactEncoding, PartitionId, VertexId};
use causeway_wire::{read_event, write_event, RecoveryEvent};
use std::io::Cursor;
use std::sync::Arc;

#[test]
fn transmitted_delta_reproduces_sender_log() {
    let sender = VertexCausalLog::new(VertexId(5), BufferPool::new(16, 32));
    let p1 = PartitionId::from_parts(0, 1);

    // 16 main bytes, 8 on (P1, 0), 4 on (P1, 1).
    sender.append_main(b"0123456789abcdef", 1).unwrap();
    sender.append_sub(p1, 0, b"8-bytes!", 1).unwrap();
    sender.append_sub(p1, 1, b"four", 1).unwrap();

    let outgoing = sender.determinants_from(0).unwrap();
    assert_eq!(outgoing.byte_len(), 28);

    // Ship it as a determinant response over the framed stream.
    let mut stream = Vec::new();
    write_event(&mut stream, &RecoveryEvent::DeterminantResponse { delta: outgoing.clone() })
        .unwrap();
    let received = match read_event(&mut Cursor::new(stream)).unwrap() {
        RecoveryEvent::DeterminantResponse { delta } => delta,
        other => panic!("expected response, got {other}"),
    };
    assert_eq!(received, outgoing);

    // Apply on the receiving task's job log as an upstream delta.
    let receiver =
        JobCausalLog::new(VertexId(9), BufferPool::new(16, 32), Arc::new(CompactEncoding));
    receiver.process_upstream_delta(&received, 1).unwrap();

    // The mirror's full log is byte-identical to the sender's.
    let mirrored = receiver.determinants_of_vertex(VertexId(5)).unwrap();
    assert_eq!(mirrored, outgoing);

    // And so is its canonical wire form.
    let mut sent_bytes = BytesMut::new();
    let mut mirrored_bytes = BytesMut::new();
    causeway_wire::encode_delta(&mut sent_bytes, &outgoing);
    causeway_wire::encode_delta(&mut mirrored_bytes, &mirrored);
    assert_eq!(sent_bytes, mirrored_bytes);
}

#[test]
fn incremental_deltas_keep_mirrors_in_sync() {
    let pool = BufferPool::new(32, 16);
    let upstream = JobCausalLog::new(VertexId(1), pool.clone(), Arc::new(CompactEncoding));
    let downstream = JobCausalLog::new(VertexId(2), pool, Arc::new(CompactEncoding));
    let consumer = causeway_core::ConsumerId(0);

    for round in 0..3u64 {
        upstream
            .append_determinant(&causeway_core::Determinant::Source { offset: round }, round + 1)
            .unwrap();

        for delta in upstream.next_for_downstream(consumer, 0).unwrap() {
            downstream.process_upstream_delta(&delta, round + 1).unwrap();
        }
    }

    assert_eq!(
        downstream.determinants_of_vertex(VertexId(1)).unwrap(),
        upstream.determinants_of_vertex(VertexId(1)).unwrap()
    );
}
