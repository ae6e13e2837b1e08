// Author: Lukas Bower
// Purpose: Define queue identities and per-frame transmit flags shared across the engine.

//! Queue identities and transmit flags.

use bitflags::bitflags;

/// Number of transmit queues owned by the engine.
pub const TX_QUEUE_COUNT: usize = 5;

/// Identity of a transmit queue.
///
/// The discriminant is the queue index used for register window lookup and
/// for the cookie queue nibble (`index + 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum QueueId {
    /// Background access category.
    Background = 0,
    /// Best-effort access category.
    BestEffort = 1,
    /// Video access category.
    Video = 2,
    /// Voice access category.
    Voice = 3,
    /// Frames released after the DTIM beacon.
    Multicast = 4,
}

impl QueueId {
    /// All queues in construction order.
    pub const ALL: [QueueId; TX_QUEUE_COUNT] = [
        QueueId::Background,
        QueueId::BestEffort,
        QueueId::Video,
        QueueId::Voice,
        QueueId::Multicast,
    ];

    /// Queue index in `0..TX_QUEUE_COUNT`.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Map an index back to a queue identity.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Background),
            1 => Some(Self::BestEffort),
            2 => Some(Self::Video),
            3 => Some(Self::Voice),
            4 => Some(Self::Multicast),
            _ => None,
        }
    }

    /// Short label used in log lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Background => "ac_bk",
            Self::BestEffort => "ac_be",
            Self::Video => "ac_vi",
            Self::Voice => "ac_vo",
            Self::Multicast => "mcast",
        }
    }
}

bitflags! {
    /// Per-frame transmit control flags supplied by the producer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TxFlags: u8 {
        /// Hold the frame until after the DTIM beacon (deferred multicast).
        const SEND_AFTER_DTIM = 0x01;
        /// The frame does not expect an acknowledgement.
        const NO_ACK = 0x02;
    }
}
