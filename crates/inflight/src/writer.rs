// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replay-aware record writer.
//!
//! Intercepts every emit: the record is logged into the in-flight logger,
//! then serialized and sent. A prepare event suspends the channel until the
//! matching request arrives (or the 1 s window lapses), then the retained
//! epochs are re-emitted in order, records first and then the barrier that
//! closed each epoch, through the same serialization path, so the replayed
//! byte stream equals the original.
//!
//! Each channel carries a single `phase` field; prepare, request, timeout,
//! and mismatch are guarded transitions on it. A prepare arriving while a
//! replay is still draining queues on the channel lock and is serviced
//! immediately after, which is the recursive case.

use crate::logger::InFlightLogger;
use crate::serializer::RecordSerializer;
use crate::InFlightError;
use causeway_core::{
    BufferHandle, BufferPool, CheckpointBarrier, Clock, Epoch, Record, SystemClock,
};
use causeway_wire::RecoveryEvent;
use parking_lot::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long a prepared channel waits for the matching request.
pub const REPLAY_TIMEOUT: Duration = Duration::from_secs(1);

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_POLLS: u32 = 100;

/// Transport seam: takes completed buffers and barriers for one channel.
///
/// The sink owns the buffers it is handed and recycles them after sending;
/// replay re-retains from the log, so this is safe.
pub trait BufferSink: Send + Sync {
    fn send_buffer(&self, sub: u32, buffer: BufferHandle) -> Result<(), InFlightError>;

    fn send_barrier(&self, sub: u32, barrier: &CheckpointBarrier) -> Result<(), InFlightError>;
}

impl<T: BufferSink + ?Sized> BufferSink for std::sync::Arc<T> {
    fn send_buffer(&self, sub: u32, buffer: BufferHandle) -> Result<(), InFlightError> {
        (**self).send_buffer(sub, buffer)
    }

    fn send_barrier(&self, sub: u32, barrier: &CheckpointBarrier) -> Result<(), InFlightError> {
        (**self).send_barrier(sub, barrier)
    }
}

/// Channel replay state. One field, no boolean flags.
enum Phase {
    Idle,
    AwaitingRequest { checkpoint: Epoch, since: Instant },
}

struct Channel<R: Record> {
    serializer: RecordSerializer<R>,
    phase: Phase,
}

pub struct RecordWriter<R: Record, S: BufferSink, C: Clock = SystemClock> {
    logger: InFlightLogger<R>,
    channels: Vec<Mutex<Channel<R>>>,
    sink: S,
    clock: C,
}

impl<R: Record, S: BufferSink> RecordWriter<R, S, SystemClock> {
    pub fn new(num_subpartitions: usize, pool: BufferPool, sink: S) -> Self {
        Self::with_clock(num_subpartitions, pool, sink, SystemClock)
    }
}

impl<R: Record, S: BufferSink, C: Clock> RecordWriter<R, S, C> {
    pub fn with_clock(num_subpartitions: usize, pool: BufferPool, sink: S, clock: C) -> Self {
        Self {
            logger: InFlightLogger::new(num_subpartitions),
            channels: (0..num_subpartitions)
                .map(|_| {
                    Mutex::new(Channel {
                        serializer: RecordSerializer::new(pool.clone()),
                        phase: Phase::Idle,
                    })
                })
                .collect(),
            sink,
            clock,
        }
    }

    pub fn logger(&self) -> &InFlightLogger<R> {
        &self.logger
    }

    /// Emit one record on `sub`: log it, then serialize and send.
    ///
    /// While the channel awaits a replay request, emission is suspended; the
    /// wait is a bounded sleep-poll that aborts the replay attempt once the
    /// window lapses.
    pub fn emit(&self, record: R, sub: u32) -> Result<(), InFlightError> {
        let mut channel = self.wait_until_idle(sub)?;
        self.logger.log_record(record.clone(), sub)?;
        for buffer in channel.serializer.serialize(&record)? {
            self.sink.send_buffer(sub, buffer)?;
        }
        Ok(())
    }

    /// Flush every channel, send the barrier on each, and record it so
    /// replay can re-emit it after its epoch's records.
    pub fn broadcast_barrier(&self, barrier: CheckpointBarrier) -> Result<(), InFlightError> {
        for sub in 0..self.channels.len() as u32 {
            let mut channel = self.wait_until_idle(sub)?;
            if let Some(buffer) = channel.serializer.finish_current() {
                self.sink.send_buffer(sub, buffer)?;
            }
            self.sink.send_barrier(sub, &barrier)?;
        }
        self.logger.log_checkpoint_barrier(barrier);
        Ok(())
    }

    /// Push any partially built buffer on `sub` out to the sink.
    pub fn flush(&self, sub: u32) -> Result<(), InFlightError> {
        let mut channel = self.channel(sub)?.lock();
        if let Some(buffer) = channel.serializer.finish_current() {
            self.sink.send_buffer(sub, buffer)?;
        }
        Ok(())
    }

    /// Handle an event from the in-flight listener. Only prepare and request
    /// events belong here; anything else is an invalid argument.
    pub fn handle_event(&self, event: &RecoveryEvent) -> Result<(), InFlightError> {
        match event {
            RecoveryEvent::InFlightLogPrepare { subpartition, checkpoint_id } => {
                self.on_prepare(*subpartition, *checkpoint_id)
            }
            RecoveryEvent::InFlightLogRequest { subpartition, checkpoint_id } => {
                self.on_request(*subpartition, *checkpoint_id)
            }
            other => Err(InFlightError::UnexpectedEvent(other.to_string())),
        }
    }

    /// Forward a completed checkpoint to the retention layer.
    pub fn notify_checkpoint_complete(&self, epoch: Epoch) {
        self.logger.notify_checkpoint_complete(epoch);
    }

    fn on_prepare(&self, sub: u32, checkpoint: Epoch) -> Result<(), InFlightError> {
        let mut channel = self.channel(sub)?.lock();
        // Half-built buffers are dropped: replay restarts the byte stream
        // from an epoch boundary.
        channel.serializer.clear();
        channel.phase = Phase::AwaitingRequest { checkpoint, since: self.clock.now() };
        debug!(sub, checkpoint, "prepared for replay, awaiting request");
        Ok(())
    }

    fn on_request(&self, sub: u32, checkpoint: Epoch) -> Result<(), InFlightError> {
        let mut channel = self.channel(sub)?.lock();
        match channel.phase {
            Phase::AwaitingRequest { checkpoint: prepared, since } => {
                channel.phase = Phase::Idle;
                if self.clock.now().duration_since(since) >= REPLAY_TIMEOUT {
                    warn!(sub, checkpoint, "replay request arrived after timeout, aborting");
                    return Ok(());
                }
                if prepared != checkpoint {
                    warn!(
                        sub,
                        prepared,
                        requested = checkpoint,
                        "replay request does not match prepare, aborting"
                    );
                    return Ok(());
                }
                self.replay(&mut channel, sub, checkpoint)
            }
            Phase::Idle => {
                warn!(sub, checkpoint, "replay request without matching prepare, ignoring");
                Ok(())
            }
        }
    }

    /// Re-emit everything after `last_seen` on `sub`: per epoch ascending,
    /// records in append order, a flush, then the epoch's barrier.
    fn replay(
        &self,
        channel: &mut Channel<R>,
        sub: u32,
        last_seen: Epoch,
    ) -> Result<(), InFlightError> {
        let epochs = self.logger.checkpoint_ids_to_replay(sub, last_seen)?;
        debug!(sub, last_seen, epochs = epochs.len(), "replaying in-flight log");
        for epoch in epochs {
            for record in self.logger.replay_log(sub, epoch)? {
                for buffer in channel.serializer.serialize(&record)? {
                    self.sink.send_buffer(sub, buffer)?;
                }
            }
            if let Some(buffer) = channel.serializer.finish_current() {
                self.sink.send_buffer(sub, buffer)?;
            }
            if let Some(barrier) = self.logger.checkpoint_barrier(sub, epoch)? {
                self.sink.send_barrier(sub, &barrier)?;
            }
        }
        Ok(())
    }

    /// Lock `sub`'s channel once it is out of the awaiting phase.
    ///
    /// Bounded sleep-poll: a request arriving on another thread resolves the
    /// phase; otherwise the timeout (or the poll bound) aborts the replay
    /// attempt and normal emission resumes.
    fn wait_until_idle(&self, sub: u32) -> Result<MutexGuard<'_, Channel<R>>, InFlightError> {
        let mut polls = 0u32;
        loop {
            let mut channel = self.channel(sub)?.lock();
            match channel.phase {
                Phase::Idle => return Ok(channel),
                Phase::AwaitingRequest { checkpoint, since } => {
                    let lapsed = self.clock.now().duration_since(since) >= REPLAY_TIMEOUT
                        || polls >= MAX_POLLS;
                    if lapsed {
                        warn!(sub, checkpoint, "replay prepare timed out, resuming emission");
                        channel.phase = Phase::Idle;
                        return Ok(channel);
                    }
                }
            }
            drop(channel);
            polls += 1;
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn channel(&self, sub: u32) -> Result<&Mutex<Channel<R>>, InFlightError> {
        self.channels.get(sub as usize).ok_or(InFlightError::UnknownSubpartition {
            sub,
            count: self.channels.len(),
        })
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
