// Author: Lukas Bower
// Purpose: Define the outbound and inbound frame containers exchanged with the MAC layer.

//! Frame containers.

use core::fmt;

use crate::cookie::Cookie;
use crate::header::RxHeader;
use crate::types::{QueueId, TxFlags};

/// Bytes reserved in front of every received frame for upper-layer prepends.
pub const RX_HEADROOM: usize = 2;

/// IEEE 802.11 frame-control More-Data bit (little-endian field).
const FCTL_MOREDATA: u16 = 0x2000;

/// Callback run exactly once when a submitted frame completes.
pub type CompletionFn = Box<dyn FnOnce(&TxReport) + Send>;

/// An outbound link-layer frame.
pub struct TxFrame {
    data: Vec<u8>,
    class: u8,
    flags: TxFlags,
    completion: Option<CompletionFn>,
}

impl TxFrame {
    /// Wrap frame bytes destined for priority class `class` (0 = highest).
    #[must_use]
    pub fn new(data: Vec<u8>, class: u8) -> Self {
        Self {
            data,
            class,
            flags: TxFlags::empty(),
            completion: None,
        }
    }

    /// Attach transmit flags.
    #[must_use]
    pub fn with_flags(mut self, flags: TxFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Attach a completion callback.
    #[must_use]
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&TxReport) + Send + 'static,
    {
        self.completion = Some(Box::new(callback));
        self
    }

    /// Frame bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Frame length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a zero-length frame.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Priority class hint supplied by the producer.
    #[must_use]
    pub fn class(&self) -> u8 {
        self.class
    }

    /// Transmit flags.
    #[must_use]
    pub fn flags(&self) -> TxFlags {
        self.flags
    }

    /// Consume the frame, dropping any pending callback without running it.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Set the More-Data bit so the device keeps releasing buffered multicast.
    ///
    /// Returns whether the bit was newly set.
    pub(crate) fn set_more_data(&mut self) -> bool {
        self.update_frame_control(|fctl| fctl | FCTL_MOREDATA)
    }

    /// Clear the More-Data bit.
    pub(crate) fn clear_more_data(&mut self) {
        self.update_frame_control(|fctl| fctl & !FCTL_MOREDATA);
    }

    fn update_frame_control(&mut self, apply: impl FnOnce(u16) -> u16) -> bool {
        let [lo, hi, ..] = self.data.as_mut_slice() else {
            return false;
        };
        let old = u16::from_le_bytes([*lo, *hi]);
        let fctl = apply(old);
        let [new_lo, new_hi] = fctl.to_le_bytes();
        *lo = new_lo;
        *hi = new_hi;
        fctl != old
    }

    pub(crate) fn take_completion(&mut self) -> Option<CompletionFn> {
        self.completion.take()
    }
}

impl fmt::Debug for TxFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxFrame")
            .field("len", &self.data.len())
            .field("class", &self.class)
            .field("flags", &self.flags)
            .field("has_completion", &self.completion.is_some())
            .finish()
    }
}

/// Hardware completion report for one transmitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxStatus {
    /// Cookie the frame was submitted with.
    pub cookie: Cookie,
    /// Whether the peer acknowledged the frame.
    pub acked: bool,
    /// Transmission attempts.
    pub frame_count: u8,
    /// RTS attempts.
    pub rts_count: u8,
}

impl TxStatus {
    /// Report for a raw cookie value.
    #[must_use]
    pub fn new(cookie: u16, acked: bool) -> Self {
        Self {
            cookie: Cookie::from_raw(cookie),
            acked,
            frame_count: 1,
            rts_count: 0,
        }
    }
}

/// Final result of a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Delivered and acknowledged.
    Acked,
    /// Transmitted but not acknowledged.
    NotAcked,
    /// Discarded by the engine before reaching the device.
    Dropped,
}

/// Completion report handed to the submitter and the MAC layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReport {
    /// Queue the frame travelled through.
    pub queue: QueueId,
    /// Result of the transmission.
    pub outcome: TxOutcome,
    /// Frame bytes transferred, excluding the transport header.
    pub bytes: usize,
    /// Transmission attempts reported by hardware.
    pub frame_count: u8,
    /// RTS attempts reported by hardware.
    pub rts_count: u8,
}

impl TxReport {
    pub(crate) fn from_status(queue: QueueId, bytes: usize, status: &TxStatus) -> Self {
        Self {
            queue,
            outcome: if status.acked {
                TxOutcome::Acked
            } else {
                TxOutcome::NotAcked
            },
            bytes,
            frame_count: status.frame_count,
            rts_count: status.rts_count,
        }
    }

    pub(crate) fn dropped(queue: QueueId, bytes: usize) -> Self {
        Self {
            queue,
            outcome: TxOutcome::Dropped,
            bytes,
            frame_count: 0,
            rts_count: 0,
        }
    }
}

/// A received frame with its device header.
///
/// The buffer starts with [`RX_HEADROOM`] reserved bytes, followed by 0 or 2
/// alignment padding bytes, followed by the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxFrame {
    buf: Vec<u8>,
    padding: usize,
    header: RxHeader,
}

impl RxFrame {
    pub(crate) fn new(buf: Vec<u8>, padding: usize, header: RxHeader) -> Self {
        debug_assert!(buf.len() >= RX_HEADROOM + padding);
        Self {
            buf,
            padding,
            header,
        }
    }

    /// Payload bytes as declared by the header.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf[RX_HEADROOM + self.padding..]
    }

    /// Padding plus payload, the region after the reserved headroom.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.buf[RX_HEADROOM..]
    }

    /// Alignment padding in front of the payload.
    #[must_use]
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Device header read ahead of the payload.
    #[must_use]
    pub fn header(&self) -> &RxHeader {
        &self.header
    }

    /// Consume into the raw buffer (headroom included) and the header.
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, RxHeader) {
        (self.buf, self.header)
    }
}
