// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collects determinant reports and streams the winning log.
//!
//! Every downstream that received any part of the failed task's determinant
//! stream reports a prefix of the same sequence, so the longest report
//! dominates all shorter ones. Called from the network-event thread only;
//! `process_response` and `pop_next` are externally serialized.

use crate::RecoveryError;
use bytes::Bytes;
use causeway_core::{Determinant, DeterminantEncoding};
use causeway_wire::RecoveryEvent;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RecoveryCoordinator {
    expected_responses: u32,
    received_responses: u32,
    best: Bytes,
    encoding: Arc<dyn DeterminantEncoding>,
    cursor: Option<Bytes>,
    next: Option<Determinant>,
    recovering: bool,
    connections_ready: bool,
}

impl RecoveryCoordinator {
    /// `expected_responses` is the number of downstream channels that will
    /// each report once.
    pub fn new(expected_responses: u32, encoding: Arc<dyn DeterminantEncoding>) -> Self {
        Self {
            expected_responses,
            received_responses: 0,
            best: Bytes::new(),
            encoding,
            cursor: None,
            next: None,
            recovering: false,
            connections_ready: false,
        }
    }

    /// Take in one downstream report. When the last expected response lands,
    /// the output connections are considered established and decoding starts
    /// over the most complete report.
    pub fn process_response(&mut self, event: &RecoveryEvent) -> Result<(), RecoveryError> {
        let RecoveryEvent::DeterminantResponse { delta } = event else {
            return Err(RecoveryError::UnexpectedEvent(event.to_string()));
        };
        if self.recovering {
            warn!("determinant response while already recovering, ignoring");
            return Ok(());
        }

        let bytes = delta.main.as_ref().map(|d| d.bytes.clone()).unwrap_or_default();
        debug!(
            vertex = %delta.vertex,
            bytes = bytes.len(),
            received = self.received_responses + 1,
            expected = self.expected_responses,
            "determinant response"
        );
        if bytes.len() > self.best.len() {
            self.best = bytes;
        }
        self.received_responses += 1;

        if self.received_responses == self.expected_responses {
            self.connections_ready = true;
            self.recovering = true;
            self.cursor = Some(self.best.clone());
            info!(log_bytes = self.best.len(), "all responses in, starting determinant replay");
            self.prefetch()?;
        }
        Ok(())
    }

    /// The prefetched determinant, advancing the stream. Draining the last
    /// one resets the coordinator for a future recovery.
    pub fn pop_next(&mut self) -> Result<Determinant, RecoveryError> {
        let Some(determinant) = self.next.take() else {
            return Err(RecoveryError::Drained);
        };
        self.prefetch()?;
        Ok(determinant)
    }

    /// The determinant `pop_next` would return, without advancing.
    pub fn peek_next(&self) -> Option<&Determinant> {
        self.next.as_ref()
    }

    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    /// True from the last response until the stream drains.
    pub fn is_recovering(&self) -> bool {
        self.recovering
    }

    /// True once every expected response has arrived.
    pub fn connections_ready(&self) -> bool {
        self.connections_ready
    }

    pub fn received_responses(&self) -> u32 {
        self.received_responses
    }

    /// Length in bytes of the most complete report seen so far.
    pub fn best_len(&self) -> usize {
        self.best.len()
    }

    fn prefetch(&mut self) -> Result<(), RecoveryError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(());
        };
        match self.encoding.decode_next(cursor) {
            Ok(Some(determinant)) => {
                self.next = Some(determinant);
                Ok(())
            }
            Ok(None) => {
                info!("determinant stream drained, recovery complete");
                self.reset();
                Ok(())
            }
            Err(err) => {
                warn!(%err, "determinant stream corrupt, abandoning recovery");
                self.reset();
                Err(err.into())
            }
        }
    }

    fn reset(&mut self) {
        self.received_responses = 0;
        self.best = Bytes::new();
        self.cursor = None;
        self.next = None;
        self.recovering = false;
        self.connections_ready = false;
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
