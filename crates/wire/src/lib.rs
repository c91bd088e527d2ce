// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery protocol for channel communication.
//!
//! Wire format: tagged binary events with fixed-width big-endian fields, plus
//! a 4-byte length prefix (big-endian) for framed stream transport.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod delta_codec;
mod event;
mod frame;

pub use delta_codec::{decode_delta, encode_delta};
pub use event::RecoveryEvent;
pub use frame::{read_event, write_event};

use thiserror::Error;

/// Errors from wire decoding and framing.
#[derive(Debug, Error)]
pub enum WireError {
    /// The event tag is not one the in-flight or recovery listeners accept.
    #[error("unknown event tag {0:#04x}")]
    UnknownEvent(u8),

    #[error("wire payload truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    /// A boolean presence marker held something other than 0 or 1.
    #[error("invalid presence marker {0:#04x}")]
    InvalidMarker(u8),

    #[error("frame of {0} bytes exceeds the {max} byte limit", max = frame::MAX_FRAME_LEN)]
    OversizedFrame(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
