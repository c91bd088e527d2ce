// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job-level causal log: the local vertex's log plus one mirror per upstream
//! vertex, with delta routing and determinant queries.

use crate::delta::VertexCausalLogDelta;
use crate::stats::CausalLogStats;
use crate::thread_log::CausalLogError;
use crate::vertex_log::VertexCausalLog;
use bytes::BytesMut;
use causeway_core::{
    BufferPool, ConsumerId, Determinant, DeterminantEncoding, Epoch, PartitionId, VertexId,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Holds the local vertex's causal log and the local mirrors of every
/// upstream vertex's log.
///
/// Mirrors carry no back-reference to this struct; lifecycle flows downward
/// through `notify_checkpoint_complete` only.
pub struct JobCausalLog {
    own: Arc<VertexCausalLog>,
    upstream: RwLock<HashMap<VertexId, Arc<VertexCausalLog>>>,
    encoding: Arc<dyn DeterminantEncoding>,
    pool: BufferPool,
}

impl JobCausalLog {
    pub fn new(vertex: VertexId, pool: BufferPool, encoding: Arc<dyn DeterminantEncoding>) -> Self {
        Self {
            own: Arc::new(VertexCausalLog::new(vertex, pool.clone())),
            upstream: RwLock::new(HashMap::new()),
            encoding,
            pool,
        }
    }

    pub fn vertex(&self) -> VertexId {
        self.own.vertex()
    }

    /// Record a main-thread determinant for the local vertex.
    pub fn append_determinant(
        &self,
        determinant: &Determinant,
        epoch: Epoch,
    ) -> Result<(), CausalLogError> {
        let mut out = BytesMut::new();
        self.encoding.encode_to(&mut out, determinant);
        self.own.append_main(&out, epoch)
    }

    /// Record a determinant tied to one output subpartition.
    pub fn append_subpartition_determinant(
        &self,
        determinant: &Determinant,
        epoch: Epoch,
        partition: PartitionId,
        sub: u32,
    ) -> Result<(), CausalLogError> {
        let mut out = BytesMut::new();
        self.encoding.encode_to(&mut out, determinant);
        self.own.append_sub(partition, sub, &out, epoch)
    }

    /// Merge a delta received from an upstream vertex into its local mirror,
    /// creating the mirror on first contact.
    pub fn process_upstream_delta(
        &self,
        delta: &VertexCausalLogDelta,
        epoch: Epoch,
    ) -> Result<(), CausalLogError> {
        debug!(vertex = %delta.vertex, bytes = delta.byte_len(), epoch, "upstream delta");
        self.mirror(delta.vertex).process_delta(delta, epoch)
    }

    /// Full log of `vertex` from epoch 0, for answering a determinant
    /// request on behalf of a failed downstream. Unknown vertices yield an
    /// empty delta (this reporter simply has no news).
    pub fn determinants_of_vertex(
        &self,
        vertex: VertexId,
    ) -> Result<VertexCausalLogDelta, CausalLogError> {
        if vertex == self.own.vertex() {
            return self.own.determinants_from(0);
        }
        match self.upstream.read().get(&vertex) {
            Some(mirror) => Arc::clone(mirror).determinants_from(0),
            None => Ok(VertexCausalLogDelta::empty(vertex)),
        }
    }

    /// New deltas for every known vertex (the local one included), one per
    /// vertex, empty deltas suppressed. Every downstream consumer sees the
    /// full history of every vertex; there is no per-partition filtering on
    /// the sender side.
    pub fn next_for_downstream(
        &self,
        consumer: ConsumerId,
        epoch: Epoch,
    ) -> Result<Vec<VertexCausalLogDelta>, CausalLogError> {
        let mut logs: Vec<Arc<VertexCausalLog>> = vec![Arc::clone(&self.own)];
        logs.extend(self.upstream.read().values().cloned());

        let mut deltas = Vec::new();
        for log in logs {
            let delta = log.next_for_downstream(consumer, epoch)?;
            if !delta.is_empty() {
                deltas.push(delta);
            }
        }
        Ok(deltas)
    }

    /// Broadcast checkpoint completion to the own log and every mirror.
    /// Per-child failures are isolated inside the vertex logs; a poisoned
    /// mirror must not stall reclamation of the others.
    pub fn notify_checkpoint_complete(&self, epoch: Epoch) {
        self.own.notify_checkpoint_complete(epoch);
        for (_, mirror) in self.mirrors() {
            mirror.notify_checkpoint_complete(epoch);
        }
    }

    pub fn main_log_length(&self) -> usize {
        self.own.main_len()
    }

    pub fn sub_log_length(&self, partition: PartitionId, sub: u32) -> usize {
        self.own.sub_len(partition, sub)
    }

    pub fn stats(&self) -> CausalLogStats {
        CausalLogStats {
            own: self.own.stats(),
            upstream: self.mirrors().into_iter().map(|(v, m)| (v.0, m.stats())).collect(),
        }
    }

    /// Atomic find-or-create of the mirror for an upstream vertex.
    fn mirror(&self, vertex: VertexId) -> Arc<VertexCausalLog> {
        if vertex == self.own.vertex() {
            error!(vertex = %vertex, "delta addressed to the local vertex, merging into own log");
            return Arc::clone(&self.own);
        }
        if let Some(mirror) = self.upstream.read().get(&vertex) {
            return Arc::clone(mirror);
        }
        let mut upstream = self.upstream.write();
        let mirror = upstream
            .entry(vertex)
            .or_insert_with(|| Arc::new(VertexCausalLog::new(vertex, self.pool.clone())));
        Arc::clone(mirror)
    }

    fn mirrors(&self) -> Vec<(VertexId, Arc<VertexCausalLog>)> {
        self.upstream.read().iter().map(|(&v, m)| (v, Arc::clone(m))).collect()
    }
}

#[cfg(test)]
#[path = "job_log_tests.rs"]
mod tests;
