// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prepare/request replay protocol against the replay-aware writer

use super::support::{CaptureSink, Observed};
use causeway_core::test_support::TestRecord;
use causeway_core::{BufferPool, CheckpointBarrier, TestClock};
use causeway_inflight::{RecordWriter, REPLAY_TIMEOUT};
use causeway_wire::RecoveryEvent;
use std::sync::Arc;
use std::time::Duration;

type Writer = RecordWriter<TestRecord, Arc<CaptureSink>, TestClock>;

fn writer(subs: usize) -> (Arc<CaptureSink>, TestClock, Writer) {
    let sink = CaptureSink::shared();
    let clock = TestClock::new();
    let writer =
        RecordWriter::with_clock(subs, BufferPool::new(128, 16), Arc::clone(&sink), clock.clone());
    (sink, clock, writer)
}

/// Fills one 16-byte segment per record, so emission order equals send order.
fn rec(n: u32) -> TestRecord {
    TestRecord::new(n, vec![n as u8; 8])
}

fn prepare(sub: u32, ckpt: u64) -> RecoveryEvent {
    RecoveryEvent::InFlightLogPrepare { subpartition: sub, checkpoint_id: ckpt }
}

fn request(sub: u32, ckpt: u64) -> RecoveryEvent {
    RecoveryEvent::InFlightLogRequest { subpartition: sub, checkpoint_id: ckpt }
}

#[test]
fn matched_prepare_and_request_replay_the_suffix() {
    let (sink, _clock, writer) = writer(3);

    // Records on sub 2 across checkpoints 7 and 8 (other channels carry
    // unrelated traffic that must not be replayed).
    writer.broadcast_barrier(CheckpointBarrier::new(6, 0)).unwrap();
    writer.broadcast_barrier(CheckpointBarrier::new(7, 0)).unwrap();
    writer.emit(rec(1), 2).unwrap();
    writer.emit(rec(2), 2).unwrap();
    writer.emit(rec(90), 0).unwrap();
    writer.broadcast_barrier(CheckpointBarrier::new(8, 0)).unwrap();
    writer.emit(rec(3), 2).unwrap();

    let original = sink.byte_stream(2);
    sink.clear();

    writer.handle_event(&prepare(2, 7)).unwrap();
    writer.handle_event(&request(2, 7)).unwrap();

    // Epoch 8 records precede barrier 8; epoch 9's record follows it.
    let transcript = sink.transcript(2);
    assert_eq!(
        transcript.iter().map(|o| matches!(o, Observed::Barrier(_))).collect::<Vec<_>>(),
        vec![false, false, true, false]
    );
    assert_eq!(transcript[2], Observed::Barrier(8));
    assert_eq!(sink.byte_stream(2), original);

    // Nothing replayed on the unrelated channel.
    assert!(sink.transcript(0).is_empty());
}

#[test]
fn mismatched_request_aborts_and_normal_emission_resumes() {
    let (sink, _clock, writer) = writer(3);
    writer.emit(rec(1), 2).unwrap();
    sink.clear();

    writer.handle_event(&prepare(2, 7)).unwrap();
    writer.handle_event(&request(2, 8)).unwrap();

    // No replay happened.
    assert!(sink.transcript(2).is_empty());

    // The channel is back to normal emission.
    writer.emit(rec(5), 2).unwrap();
    assert_eq!(sink.transcript(2).len(), 1);
}

#[test]
fn replay_timeout_returns_channel_to_idle() {
    let (sink, clock, writer) = writer(1);
    writer.emit(rec(1), 0).unwrap();
    sink.clear();

    writer.handle_event(&prepare(0, 1)).unwrap();

    // No request within the window.
    clock.advance(REPLAY_TIMEOUT + Duration::from_millis(1));

    // Subsequent normal emit proceeds (and the stale prepare is gone).
    writer.emit(rec(2), 0).unwrap();
    assert_eq!(sink.transcript(0).len(), 1);

    writer.handle_event(&request(0, 1)).unwrap();
    assert_eq!(sink.transcript(0).len(), 1, "late request must not trigger a replay");
}

#[test]
fn replay_arrives_within_window() {
    let (sink, clock, writer) = writer(1);
    writer.emit(rec(1), 0).unwrap();
    sink.clear();

    writer.handle_event(&prepare(0, 0)).unwrap();
    clock.advance(Duration::from_millis(200));
    writer.handle_event(&request(0, 0)).unwrap();

    // Replay of the single epoch-1 record.
    assert_eq!(sink.transcript(0).len(), 1);
}
