// Author: Lukas Bower
// Purpose: Encode and decode the 16-bit TX correlation cookie echoed in completion reports.

//! Correlation cookie codec.
//!
//! The upper nibble carries `queue index + 1`, the lower 12 bits the packet
//! slot. `0x0000` is used by the receive path and `0xffff` by multicast
//! framing, so neither may ever name a slot. Decoding must be total: the
//! value comes from hardware that may be out of step with the host.

use core::fmt;

use crate::error::CookieError;
use crate::types::QueueId;

/// Number of low bits that carry the slot index.
pub const SLOT_BITS: u32 = 12;
/// Mask for the slot index.
pub const SLOT_MASK: u16 = (1 << SLOT_BITS) - 1;
/// Largest slot array a cookie can address.
pub const MAX_COOKIE_SLOTS: usize = 1 << SLOT_BITS;

/// Opaque token attached to an outbound frame and echoed back on completion.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cookie(u16);

impl Cookie {
    /// Encode a queue/slot pair.
    pub fn encode(queue: QueueId, slot: usize) -> Result<Self, CookieError> {
        if slot >= MAX_COOKIE_SLOTS {
            return Err(CookieError::SlotOutOfRange {
                queue,
                slot,
                limit: MAX_COOKIE_SLOTS,
            });
        }
        Ok(Self::for_slot(queue, slot as u16))
    }

    /// Infallible encode for slot indices already bounded by a slot array.
    pub(crate) fn for_slot(queue: QueueId, slot: u16) -> Self {
        debug_assert!(usize::from(slot) < MAX_COOKIE_SLOTS);
        let nibble = (queue as u16) + 1;
        Self((nibble << SLOT_BITS) | (slot & SLOT_MASK))
    }

    /// Wrap a raw value taken from a completion report.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw 16-bit value.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Decode into a queue and a slot index below `slots`.
    pub fn decode(self, slots: usize) -> Result<(QueueId, usize), CookieError> {
        if self.0 == 0x0000 || self.0 == 0xffff {
            return Err(CookieError::Reserved(self.0));
        }
        let nibble = (self.0 >> SLOT_BITS) as u8;
        let queue = usize::from(nibble)
            .checked_sub(1)
            .and_then(QueueId::from_index)
            .ok_or(CookieError::UnknownQueue(nibble))?;
        let slot = usize::from(self.0 & SLOT_MASK);
        if slot >= slots {
            return Err(CookieError::SlotOutOfRange {
                queue,
                slot,
                limit: slots,
            });
        }
        Ok((queue, slot))
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cookie({:#06x})", self.0)
    }
}

impl From<Cookie> for u16 {
    fn from(cookie: Cookie) -> Self {
        cookie.0
    }
}
