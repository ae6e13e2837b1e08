// Author: Lukas Bower
// Purpose: Map priority classes and transmit flags onto transmit queues.

//! Queue selection.

use log::warn;

use crate::types::{QueueId, TxFlags};

/// Queue serving priority class `class` (0 = highest).
///
/// With QoS off every class shares the best-effort queue. Unknown classes
/// go to the voice queue.
#[must_use]
pub fn queue_for_class(class: u8, qos: bool) -> QueueId {
    if !qos {
        return QueueId::BestEffort;
    }
    match class {
        0 => QueueId::Voice,
        1 => QueueId::Video,
        2 => QueueId::BestEffort,
        3 => QueueId::Background,
        other => {
            warn!("[pio] unknown priority class {other}, using voice queue");
            QueueId::Voice
        }
    }
}

/// Queue for a frame with priority `class` and `flags`.
///
/// Frames held for the DTIM beacon always take the multicast queue.
#[must_use]
pub fn route(class: u8, flags: TxFlags, qos: bool) -> QueueId {
    if flags.contains(TxFlags::SEND_AFTER_DTIM) {
        QueueId::Multicast
    } else {
        queue_for_class(class, qos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_map_highest_first() {
        assert_eq!(queue_for_class(0, true), QueueId::Voice);
        assert_eq!(queue_for_class(1, true), QueueId::Video);
        assert_eq!(queue_for_class(2, true), QueueId::BestEffort);
        assert_eq!(queue_for_class(3, true), QueueId::Background);
        assert_eq!(queue_for_class(9, true), QueueId::Voice);
    }

    #[test]
    fn qos_off_collapses_to_best_effort() {
        for class in 0..=4 {
            assert_eq!(queue_for_class(class, false), QueueId::BestEffort);
        }
    }

    #[test]
    fn deferred_multicast_overrides_priority() {
        assert_eq!(
            route(0, TxFlags::SEND_AFTER_DTIM, true),
            QueueId::Multicast
        );
        assert_eq!(
            route(3, TxFlags::SEND_AFTER_DTIM, false),
            QueueId::Multicast
        );
        assert_eq!(route(3, TxFlags::NO_ACK, true), QueueId::Background);
    }
}
