// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Forward replay and checkpoint reclaim over the in-flight log

use causeway_core::test_support::{BufferBackedRecord, TestRecord};
use causeway_core::BufferPool;
use causeway_inflight::SubpartitionInFlightLog;

#[test]
fn forward_replay_walks_epochs_in_order() {
    let log = SubpartitionInFlightLog::new();
    for n in 1..=5u32 {
        log.log(TestRecord::new(n, vec![n as u8]), 3).unwrap();
    }
    for n in 6..=8u32 {
        log.log(TestRecord::new(n, vec![n as u8]), 4).unwrap();
    }

    let mut iter = log.iter_from(3).unwrap();
    assert!(iter.has_next());
    assert_eq!(iter.num_remaining(), 8);

    let mut tags = Vec::new();
    let mut epochs = Vec::new();
    while iter.has_next() {
        let record = iter.next().unwrap();
        tags.push(record.tag);
        epochs.push(iter.current_epoch().unwrap());
    }

    assert_eq!(tags, (1..=8).collect::<Vec<_>>());
    // The epoch transition lands exactly between r5 and r6.
    assert_eq!(epochs, vec![3, 3, 3, 3, 3, 4, 4, 4]);
    assert!(!iter.has_next());
    assert_eq!(iter.num_remaining(), 0);
}

#[test]
fn checkpoint_reclaim_recycles_and_shrinks() {
    let pool = BufferPool::new(16, 32);
    let log = SubpartitionInFlightLog::new();

    // Ten records spread over epochs 1..3; each carries its own segment.
    let spread = [(1u64, 3usize), (2, 4), (3, 3)];
    let mut tag = 0u32;
    for &(epoch, count) in &spread {
        for _ in 0..count {
            let buffer = pool.request().unwrap();
            buffer.append(&[tag as u8]).unwrap();
            log.log(BufferBackedRecord::new(tag, buffer.clone()), epoch).unwrap();
            buffer.recycle().unwrap();
            tag += 1;
        }
    }
    assert_eq!(log.len(), 10);
    assert_eq!(pool.available(), 6);

    log.notify_checkpoint_complete(2);

    // The three epoch-1 buffers are free again (count dropped to zero).
    assert_eq!(pool.available(), 9);
    assert_eq!(log.len(), 7);

    let iter = log.iter_from(2).unwrap();
    assert_eq!(iter.num_remaining(), 7);
    drop(iter);

    // Reclaim must not touch buffers an outstanding iterator retains.
    let mut iter = log.iter_from(2).unwrap();
    log.notify_checkpoint_complete(3);
    assert_eq!(log.len(), 3);
    let record = iter.next().unwrap();
    assert_eq!(record.buffer.slice(0, 1).unwrap(), vec![3u8]);
    drop(iter);

    // With every reader done, only epoch-3 segments remain checked out.
    assert_eq!(pool.available(), 13);
}
