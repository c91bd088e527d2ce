// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use causeway_core::{BufferPool, ConsumerId, PartitionId, VertexId};

fn pool() -> BufferPool {
    BufferPool::new(64, 32)
}

fn p(n: u64) -> PartitionId {
    PartitionId::from_parts(0, n)
}

#[test]
fn test_compose_omits_empty_children() {
    let log = VertexCausalLog::new(VertexId(1), pool());

    log.append_main(b"main-bytes", 1).unwrap();
    log.append_sub(p(1), 0, b"sub-zero", 1).unwrap();

    // Touch a child without writing: it must not appear in the delta.
    assert_eq!(log.sub_len(p(1), 3), 0);

    let delta = log.determinants_from(0).unwrap();
    assert_eq!(delta.vertex, VertexId(1));
    assert_eq!(&delta.main.unwrap().bytes[..], b"main-bytes");
    assert_eq!(delta.partitions.len(), 1);
    assert_eq!(&delta.partitions[&p(1)][&0].bytes[..], b"sub-zero");
}

#[test]
fn test_compose_orders_partitions_and_subs() {
    let log = VertexCausalLog::new(VertexId(1), pool());

    log.append_sub(p(2), 1, b"b1", 1).unwrap();
    log.append_sub(p(1), 1, b"a1", 1).unwrap();
    log.append_sub(p(2), 0, b"b0", 1).unwrap();
    log.append_sub(p(1), 0, b"a0", 1).unwrap();

    let delta = log.determinants_from(0).unwrap();
    let partitions: Vec<_> = delta.partitions.keys().copied().collect();
    assert_eq!(partitions, vec![p(1), p(2)]);
    for subs in delta.partitions.values() {
        let indices: Vec<_> = subs.keys().copied().collect();
        assert_eq!(indices, vec![0, 1]);
    }
}

#[test]
fn test_process_delta_reproduces_sender_log() {
    let sender = VertexCausalLog::new(VertexId(3), pool());
    sender.append_main(b"0123456789abcdef", 2).unwrap();
    sender.append_sub(p(1), 0, b"12345678", 2).unwrap();
    sender.append_sub(p(1), 1, b"1234", 2).unwrap();

    let delta = sender.determinants_from(0).unwrap();

    let receiver = VertexCausalLog::new(VertexId(3), pool());
    receiver.process_delta(&delta, 2).unwrap();

    assert_eq!(receiver.determinants_from(0).unwrap(), delta);
    assert_eq!(receiver.main_len(), 16);
    assert_eq!(receiver.sub_len(p(1), 0), 8);
    assert_eq!(receiver.sub_len(p(1), 1), 4);
}

#[test]
fn test_next_for_downstream_advances_cursor() {
    let log = VertexCausalLog::new(VertexId(1), pool());
    let consumer = ConsumerId(0);

    log.append_main(b"first", 1).unwrap();
    let d1 = log.next_for_downstream(consumer, 0).unwrap();
    assert_eq!(&d1.main.unwrap().bytes[..], b"first");

    let d2 = log.next_for_downstream(consumer, 0).unwrap();
    assert!(d2.is_empty());

    log.append_main(b"second", 1).unwrap();
    log.append_sub(p(9), 2, b"late-sub", 1).unwrap();
    let d3 = log.next_for_downstream(consumer, 0).unwrap();
    assert_eq!(&d3.main.unwrap().bytes[..], b"second");
    assert_eq!(&d3.partitions[&p(9)][&2].bytes[..], b"late-sub");
}

#[test]
fn test_checkpoint_broadcast_reclaims_all_children() {
    let shared = pool();
    let log = VertexCausalLog::new(VertexId(1), shared.clone());

    log.append_main(b"m1", 1).unwrap();
    log.append_sub(p(1), 0, b"s1", 1).unwrap();
    log.append_main(b"m2", 2).unwrap();
    log.append_sub(p(1), 0, b"s2", 2).unwrap();

    log.notify_checkpoint_complete(2);

    assert_eq!(log.main_len(), 2);
    assert_eq!(log.sub_len(p(1), 0), 2);
    let delta = log.determinants_from(0).unwrap();
    assert_eq!(&delta.main.unwrap().bytes[..], b"m2");
}

#[test]
fn test_concurrent_find_or_create_converges() {
    let log = std::sync::Arc::new(VertexCausalLog::new(VertexId(1), pool()));

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let log = std::sync::Arc::clone(&log);
        handles.push(std::thread::spawn(move || {
            log.append_sub(p(1), 0, &[i as u8], 1).unwrap();
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    // All eight writers landed in the same child log.
    assert_eq!(log.sub_len(p(1), 0), 8);
}
