// Author: Lukas Bower
// Purpose: Define the error taxonomy surfaced by the PIO transfer engine.

//! Error types for the PIO engine.
//!
//! Capacity errors are reported synchronously to the submitter. Decode and
//! receive errors never reach a submitter; the engine logs and counts them.

use core::fmt;

use crate::frame::TxFrame;
use crate::types::QueueId;

/// Failure to encode or decode a correlation cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CookieError {
    /// `0x0000` and `0xffff` are reserved and never carry a queue/slot pair.
    #[error("reserved cookie value {0:#06x}")]
    Reserved(u16),
    /// The queue nibble does not name a configured queue.
    #[error("cookie queue nibble {0:#x} is not mapped to a queue")]
    UnknownQueue(u8),
    /// The slot index does not fit the queue's slot array.
    #[error("slot {slot} out of range for {queue:?} (limit {limit})")]
    SlotOutOfRange {
        /// Queue decoded from the cookie.
        queue: QueueId,
        /// Slot index decoded from the cookie.
        slot: usize,
        /// Number of slots the queue owns.
        limit: usize,
    },
}

/// Failure to build the transport header for an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    /// The encryption key for this frame is gone; it must not leave unencrypted.
    #[error("encryption key missing")]
    MissingKey,
    /// The frame does not fit the header's length field.
    #[error("frame length {len} exceeds header limit {max}")]
    TooLong {
        /// Frame length in bytes.
        len: usize,
        /// Largest length the header can express.
        max: usize,
    },
    /// The builder produced a header of a different size than it advertised.
    #[error("header length mismatch: expected {expected} produced {actual}")]
    LengthMismatch {
        /// Length advertised by the builder.
        expected: usize,
        /// Length actually produced.
        actual: usize,
    },
}

/// Reason a frame was refused by [`crate::tx::TxQueue::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// Header plus frame is larger than the whole queue buffer.
    #[error("frame needs {len} bytes but queue buffer holds {capacity}")]
    FrameTooLarge {
        /// Rounded on-wire size of the frame.
        len: u32,
        /// Total queue buffer size.
        capacity: u32,
    },
    /// Every packet slot is in flight.
    #[error("no free tx packet slot")]
    NoSlots,
    /// The queue buffer cannot hold the frame right now; the queue is stopped.
    #[error("frame needs {needed} bytes but only {available} are free")]
    InsufficientBuffer {
        /// Rounded on-wire size of the frame.
        needed: u32,
        /// Bytes currently free in the queue buffer.
        available: u32,
    },
    /// Header generation failed for a reason other than a missing key.
    #[error("tx header generation failed: {0}")]
    Header(HeaderError),
}

/// A refused frame handed back to its submitter.
#[derive(thiserror::Error)]
#[error("tx submission rejected: {error}")]
pub struct SubmitRejected {
    /// Why the frame was refused.
    pub error: SubmitError,
    /// The frame with its payload as submitted, so it can be resubmitted
    /// after a resume signal.
    pub frame: TxFrame,
}

impl SubmitRejected {
    pub(crate) fn new(error: SubmitError, frame: TxFrame) -> Self {
        Self { error, frame }
    }

    /// Split into the error and the returned frame.
    #[must_use]
    pub fn into_parts(self) -> (SubmitError, TxFrame) {
        (self.error, self.frame)
    }
}

impl fmt::Debug for SubmitRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitRejected")
            .field("error", &self.error)
            .field("frame_len", &self.frame.len())
            .finish()
    }
}

/// A hardware completion report that could not be matched to an in-flight frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// The cookie could not be decoded.
    #[error(transparent)]
    Cookie(#[from] CookieError),
    /// The cookie names a slot that holds no frame (stale or duplicate report).
    #[error("slot {slot} of {queue:?} has no frame in flight")]
    SlotNotInFlight {
        /// Queue decoded from the cookie.
        queue: QueueId,
        /// Slot decoded from the cookie.
        slot: usize,
    },
}

/// Non-fatal receive failures. Each discards exactly one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RxError {
    /// Header declared an empty frame.
    #[error("len == 0")]
    ZeroLength,
    /// Header declared a frame longer than the hard maximum.
    #[error("len {len:#x} > {max:#x}")]
    TooLong {
        /// Declared length.
        len: u16,
        /// Configured maximum.
        max: u16,
    },
    /// The frame failed its checksum and bad-FCS delivery is off.
    #[error("frame fcs error")]
    FcsFailure,
    /// Data-ready never asserted after frame-ready was acknowledged.
    #[error("timed out waiting for data ready")]
    DataTimeout,
    /// No memory for the output buffer.
    #[error("out of memory")]
    OutOfMemory,
}

/// Engine construction failure. Partially built queues are already torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    /// The core revision has no register window for this queue index.
    #[error("no pio register window for queue index {0}")]
    InvalidQueueIndex(usize),
    /// The buffer size read from (or configured for) a queue is unusable.
    #[error("unusable tx buffer size {raw} for {queue:?}")]
    BufferSizeUnusable {
        /// Queue being constructed.
        queue: QueueId,
        /// Raw size before the reserve was subtracted.
        raw: u32,
    },
    /// Requested slot count is zero or above the slot array capacity.
    #[error("invalid tx slot count {requested} (max {max})")]
    InvalidSlotCount {
        /// Slots requested by configuration.
        requested: usize,
        /// Slot array capacity.
        max: usize,
    },
    /// The MAC layer advertises a header larger than the header buffer.
    #[error("tx header length {len} exceeds {max}")]
    HeaderTooLong {
        /// Advertised header length.
        len: usize,
        /// Header buffer capacity.
        max: usize,
    },
}
