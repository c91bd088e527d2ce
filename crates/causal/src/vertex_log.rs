// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-vertex aggregation: one main-thread log plus a sparse 2-D map of
//! subpartition logs, all sharing the vertex's buffer pool.

use crate::delta::{ThreadLogDelta, VertexCausalLogDelta};
use crate::stats::VertexLogStats;
use crate::thread_log::{CausalLogError, ThreadCausalLog};
use causeway_core::{BufferPool, ConsumerId, Epoch, PartitionId, VertexId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;

/// Causal log of one vertex: the main thread plus `(partition, sub)` children
/// created lazily on first write.
pub struct VertexCausalLog {
    vertex: VertexId,
    pool: BufferPool,
    main: ThreadCausalLog,
    subs: RwLock<BTreeMap<PartitionId, BTreeMap<u32, Arc<ThreadCausalLog>>>>,
}

impl VertexCausalLog {
    pub fn new(vertex: VertexId, pool: BufferPool) -> Self {
        Self {
            vertex,
            main: ThreadCausalLog::new(pool.clone()),
            subs: RwLock::new(BTreeMap::new()),
            pool,
        }
    }

    pub fn vertex(&self) -> VertexId {
        self.vertex
    }

    /// Append to the main-thread log.
    pub fn append_main(&self, bytes: &[u8], epoch: Epoch) -> Result<(), CausalLogError> {
        self.main.append(bytes, epoch)
    }

    /// Append to a subpartition child, creating it on first use.
    pub fn append_sub(
        &self,
        partition: PartitionId,
        sub: u32,
        bytes: &[u8],
        epoch: Epoch,
    ) -> Result<(), CausalLogError> {
        self.child(partition, sub).append(bytes, epoch)
    }

    /// Apply an incoming delta: main bytes to the main log, each subpartition
    /// delta to its child.
    pub fn process_delta(
        &self,
        delta: &VertexCausalLogDelta,
        epoch: Epoch,
    ) -> Result<(), CausalLogError> {
        if let Some(main) = &delta.main {
            self.main.append(&main.bytes, epoch)?;
        }
        for (&partition, subs) in &delta.partitions {
            for (&sub, d) in subs {
                self.child(partition, sub).append(&d.bytes, epoch)?;
            }
        }
        Ok(())
    }

    /// Compose the full-log delta from `start_epoch`: bulk query, cursors
    /// untouched, zero-byte children omitted.
    pub fn determinants_from(&self, start_epoch: Epoch) -> Result<VertexCausalLogDelta, CausalLogError> {
        self.compose(
            |log| log.determinants_from(start_epoch).map(|bytes| ThreadLogDelta::new(bytes, 0)),
        )
    }

    /// Compose the unread delta for `consumer`, advancing its cursor on every
    /// child.
    pub fn next_for_downstream(
        &self,
        consumer: ConsumerId,
        epoch: Epoch,
    ) -> Result<VertexCausalLogDelta, CausalLogError> {
        self.compose(|log| log.next_for_consumer(consumer, epoch))
    }

    /// Broadcast checkpoint completion to every child. A failing child is
    /// logged and the broadcast continues; reclamation of the rest must not
    /// be held up by one bad segment.
    pub fn notify_checkpoint_complete(&self, epoch: Epoch) {
        if let Err(err) = self.main.notify_checkpoint_complete(epoch) {
            error!(vertex = %self.vertex, %err, "main log reclamation failed");
        }
        for (partition, sub, log) in self.children() {
            if let Err(err) = log.notify_checkpoint_complete(epoch) {
                error!(
                    vertex = %self.vertex,
                    partition = %partition,
                    sub,
                    %err,
                    "subpartition log reclamation failed"
                );
            }
        }
    }

    pub fn main_len(&self) -> usize {
        self.main.len()
    }

    pub fn sub_len(&self, partition: PartitionId, sub: u32) -> usize {
        self.subs
            .read()
            .get(&partition)
            .and_then(|subs| subs.get(&sub))
            .map_or(0, |log| log.len())
    }

    pub fn stats(&self) -> VertexLogStats {
        let sub_bytes = self.children().into_iter().map(|(_, _, log)| log.len()).sum();
        VertexLogStats {
            vertex: self.vertex,
            main_bytes: self.main.len(),
            sub_bytes,
        }
    }

    /// Find-or-create a child log, atomic per `(partition, sub)` pair:
    /// read-path fast hit, then a double-checked insertion under the write
    /// lock so concurrent callers converge on the same instance.
    fn child(&self, partition: PartitionId, sub: u32) -> Arc<ThreadCausalLog> {
        if let Some(log) = self.subs.read().get(&partition).and_then(|s| s.get(&sub)) {
            return Arc::clone(log);
        }
        let mut subs = self.subs.write();
        let log = subs
            .entry(partition)
            .or_default()
            .entry(sub)
            .or_insert_with(|| Arc::new(ThreadCausalLog::new(self.pool.clone())));
        Arc::clone(log)
    }

    fn children(&self) -> Vec<(PartitionId, u32, Arc<ThreadCausalLog>)> {
        self.subs
            .read()
            .iter()
            .flat_map(|(&p, subs)| subs.iter().map(move |(&s, log)| (p, s, Arc::clone(log))))
            .collect()
    }

    fn compose(
        &self,
        mut query: impl FnMut(&ThreadCausalLog) -> Result<ThreadLogDelta, CausalLogError>,
    ) -> Result<VertexCausalLogDelta, CausalLogError> {
        let mut delta = VertexCausalLogDelta::empty(self.vertex);
        let main = query(&self.main)?;
        if !main.is_empty() {
            delta.main = Some(main);
        }
        for (partition, sub, log) in self.children() {
            let d = query(&log)?;
            if !d.is_empty() {
                delta.insert_sub(partition, sub, d);
            }
        }
        Ok(delta)
    }
}

#[cfg(test)]
#[path = "vertex_log_tests.rs"]
mod tests;
