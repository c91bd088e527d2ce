// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serializable snapshots of log occupancy

use causeway_core::VertexId;
use serde::Serialize;
use std::collections::BTreeMap;

/// Occupancy of one vertex log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VertexLogStats {
    pub vertex: VertexId,
    pub main_bytes: usize,
    pub sub_bytes: usize,
}

/// Occupancy of the whole job causal log: the local vertex plus each
/// upstream mirror, keyed by raw vertex id for stable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CausalLogStats {
    pub own: VertexLogStats,
    pub upstream: BTreeMap<u16, VertexLogStats>,
}

impl CausalLogStats {
    pub fn total_bytes(&self) -> usize {
        self.own.main_bytes
            + self.own.sub_bytes
            + self.upstream.values().map(|s| s.main_bytes + s.sub_bytes).sum::<usize>()
    }
}
