// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! causeway-recovery: determinant recovery on a restarting task.
//!
//! The coordinator collects one `DeterminantResponse` per downstream channel,
//! keeps the most complete report, and streams decoded determinants to the
//! execution driver one at a time until the log is drained.

mod coordinator;

pub use coordinator::RecoveryCoordinator;

use causeway_core::CodecError;
use thiserror::Error;

/// Errors from determinant recovery.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// The determinant stream is exhausted. Normal termination: the
    /// coordinator has already reset itself.
    #[error("determinant stream drained")]
    Drained,

    /// The recovery listener only accepts determinant responses.
    #[error("unexpected event on recovery listener: {0}")]
    UnexpectedEvent(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
