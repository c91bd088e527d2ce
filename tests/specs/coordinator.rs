// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery coordinator: response collection and determinant streaming

use bytes::{Bytes, BytesMut};
use causeway_causal::{ThreadLogDelta, VertexCausalLogDelta};
use causeway_core::{CompactEncoding, Determinant, DeterminantEncoding, VertexId};
use causeway_recovery::{RecoveryCoordinator, RecoveryError};
use causeway_wire::RecoveryEvent;
use std::sync::Arc;

fn encoded_prefix(determinants: &[Determinant]) -> Bytes {
    let encoding = CompactEncoding;
    let mut out = BytesMut::new();
    for d in determinants {
        encoding.encode_to(&mut out, d);
    }
    out.freeze()
}

fn response(bytes: Bytes) -> RecoveryEvent {
    let mut delta = VertexCausalLogDelta::empty(VertexId(1));
    delta.main = Some(ThreadLogDelta::new(bytes, 0));
    RecoveryEvent::DeterminantResponse { delta }
}

#[test]
fn longest_of_three_reports_wins_and_streams() {
    // One shared decision history; each downstream channel received a prefix
    // of it. Encoded prefix sizes here: 44, 54, and 64 bytes.
    let history = vec![
        Determinant::Timer { timer_id: 3, timestamp: 50 },
        Determinant::Rng { seed: 7 },
        Determinant::Rng { seed: 8 },
        Determinant::Rng { seed: 9 },
        Determinant::Order { channel: 0 },
        Determinant::Order { channel: 1 },
        Determinant::Order { channel: 2 },
        Determinant::Order { channel: 0 },
    ];
    let short = encoded_prefix(&history[..4]);
    let mid = encoded_prefix(&history[..6]);
    let full = encoded_prefix(&history);
    assert_eq!((short.len(), mid.len(), full.len()), (44, 54, 64));

    let mut coordinator = RecoveryCoordinator::new(3, Arc::new(CompactEncoding));
    coordinator.process_response(&response(short)).unwrap();
    coordinator.process_response(&response(full)).unwrap();
    assert!(!coordinator.is_recovering());

    coordinator.process_response(&response(mid)).unwrap();
    assert_eq!(coordinator.best_len(), 64);
    assert!(coordinator.is_recovering());
    assert!(coordinator.connections_ready());

    // The driver pulls the history back out, one decision at a time.
    let mut replayed = Vec::new();
    while coordinator.has_more() {
        replayed.push(coordinator.pop_next().unwrap());
    }
    assert_eq!(replayed, history);

    // Drained: back at rest, ready for a future recovery.
    assert!(!coordinator.is_recovering());
    assert!(matches!(coordinator.pop_next(), Err(RecoveryError::Drained)));
}
