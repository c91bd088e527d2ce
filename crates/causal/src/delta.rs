// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log deltas: byte suffixes of a log since a consumer cursor

use bytes::Bytes;
use causeway_core::{PartitionId, VertexId};
use std::collections::BTreeMap;

/// Unread progress of one thread log for one consumer: a contiguous byte
/// range plus the offset of its first byte within the starting epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLogDelta {
    pub bytes: Bytes,
    pub start_offset: u32,
}

impl ThreadLogDelta {
    /// The only constructor: the offset is always explicit.
    pub fn new(bytes: Bytes, start_offset: u32) -> Self {
        Self { bytes, start_offset }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Delta of one vertex's whole causal log: the main-thread delta (absent when
/// it carries zero new bytes) plus per-subpartition deltas.
///
/// The inner maps are `BTreeMap` so iteration order, and therefore the wire
/// encoding, is canonical: partitions in lexicographic id order,
/// subpartitions by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexCausalLogDelta {
    pub vertex: VertexId,
    pub main: Option<ThreadLogDelta>,
    pub partitions: BTreeMap<PartitionId, BTreeMap<u32, ThreadLogDelta>>,
}

impl VertexCausalLogDelta {
    pub fn empty(vertex: VertexId) -> Self {
        Self { vertex, main: None, partitions: BTreeMap::new() }
    }

    /// Insert a subpartition delta, keeping canonical map order.
    pub fn insert_sub(&mut self, partition: PartitionId, sub: u32, delta: ThreadLogDelta) {
        self.partitions.entry(partition).or_default().insert(sub, delta);
    }

    /// True when neither the main delta nor any subpartition carries bytes.
    pub fn is_empty(&self) -> bool {
        self.main.as_ref().is_none_or(|d| d.is_empty())
            && self.partitions.values().all(|subs| subs.values().all(|d| d.is_empty()))
    }

    /// Total payload bytes across the main and subpartition deltas.
    pub fn byte_len(&self) -> usize {
        let main = self.main.as_ref().map_or(0, ThreadLogDelta::len);
        let subs: usize =
            self.partitions.values().flat_map(|s| s.values()).map(ThreadLogDelta::len).sum();
        main + subs
    }
}
