// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    order = { Determinant::Order { channel: 3 } },
    timer = { Determinant::Timer { timer_id: 17, timestamp: 1_000_042 } },
    rng = { Determinant::Rng { seed: u64::MAX } },
    source = { Determinant::Source { offset: 0 } },
    buffer = { Determinant::Buffer { subpartition: 2, length: 32_768 } },
)]
fn round_trip(determinant: Determinant) {
    let encoding = CompactEncoding;
    let mut cursor = encoding.encode(&determinant);
    assert_eq!(encoding.decode_next(&mut cursor).unwrap(), Some(determinant));
    assert_eq!(encoding.decode_next(&mut cursor).unwrap(), None);
}

#[test]
fn test_decode_sequence_in_order() {
    let encoding = CompactEncoding;
    let input = vec![
        Determinant::Order { channel: 0 },
        Determinant::Timer { timer_id: 1, timestamp: 2 },
        Determinant::Order { channel: 1 },
        Determinant::Source { offset: 99 },
    ];

    let mut out = bytes::BytesMut::new();
    for d in &input {
        encoding.encode_to(&mut out, d);
    }

    let mut cursor = out.freeze();
    let mut decoded = Vec::new();
    while let Some(d) = encoding.decode_next(&mut cursor).unwrap() {
        decoded.push(d);
    }
    assert_eq!(decoded, input);
}

#[test]
fn test_decode_empty_is_end() {
    let encoding = CompactEncoding;
    let mut cursor = bytes::Bytes::new();
    assert_eq!(encoding.decode_next(&mut cursor).unwrap(), None);
}

#[test]
fn test_decode_unknown_tag() {
    let encoding = CompactEncoding;
    let mut cursor = bytes::Bytes::from_static(&[0x7f, 0, 0, 0, 0]);
    assert_eq!(encoding.decode_next(&mut cursor), Err(CodecError::UnknownTag(0x7f)));
}

#[test]
fn test_decode_truncated_body() {
    let encoding = CompactEncoding;
    // Timer tag promises 16 body bytes; supply 3.
    let mut cursor = bytes::Bytes::from_static(&[0x02, 1, 2, 3]);
    assert_eq!(
        encoding.decode_next(&mut cursor),
        Err(CodecError::Truncated { need: 16, have: 3 })
    );
}

#[test]
fn test_display_names() {
    assert_eq!(Determinant::Order { channel: 0 }.to_string(), "order");
    assert_eq!(Determinant::Buffer { subpartition: 0, length: 0 }.to_string(), "buffer");
}
