// Author: Lukas Bower
// Purpose: Declare the upstream and downstream collaborators the PIO engine calls into.

//! Collaborator interfaces.
//!
//! [`FlowControl`] is the upstream scheduler that feeds frames per priority
//! class; [`MacLayer`] is the downstream MAC processing layer that consumes
//! received frames and completion reports. [`RxScheduler`] runs the receive
//! work item cooperatively.

use std::sync::Arc;

use crate::cookie::Cookie;
use crate::error::HeaderError;
use crate::frame::{RxFrame, TxFrame, TxReport};
use crate::header::{self, TxHeaderBuf, BASIC_TX_HEADER_LEN};

/// Downstream MAC processing layer.
///
/// `report_tx_outcome` may run from the completion context and must not block.
/// `build_tx_header` and `announce_multicast_cookie` run while the transmit
/// queue's lock is held and must not call back into the engine; the other
/// hooks run with no engine lock held.
pub trait MacLayer: Send + Sync {
    /// Hand over one validated received frame.
    fn deliver_frame(&self, frame: RxFrame);

    /// Return a completed frame with its report. Called once per accepted frame.
    fn report_tx_outcome(&self, frame: TxFrame, report: &TxReport);

    /// Length of the header [`MacLayer::build_tx_header`] produces.
    fn tx_header_len(&self) -> usize {
        BASIC_TX_HEADER_LEN
    }

    /// Build the firmware TX header for `frame`, embedding `cookie`.
    fn build_tx_header(
        &self,
        frame: &TxFrame,
        cookie: Cookie,
        out: &mut TxHeaderBuf,
    ) -> Result<(), HeaderError> {
        header::build_basic_tx_header(frame, cookie, out)
    }

    /// Tell firmware which cookie closes the current multicast burst.
    fn announce_multicast_cookie(&self, _cookie: Cookie) {}

    /// Keep the radio awake (`true`) or release it to power saving (`false`).
    fn set_awake(&self, _awake: bool) {}
}

/// Upstream flow control, per priority class.
///
/// Both signals are raised while the transmit queue's lock is held, so they
/// arrive in the order the queue changed state. Implementations must not call
/// back into the engine.
pub trait FlowControl: Send + Sync {
    /// Stop submitting frames of `class` until [`FlowControl::queue_resumed`].
    fn queue_stopped(&self, class: u8);
    /// Submissions for `class` may continue.
    fn queue_resumed(&self, class: u8);
}

/// Cooperative scheduler that runs the receive work item.
pub trait RxScheduler: Send + Sync {
    /// Queue a run of [`crate::engine::PioEngine::rx_work`].
    fn schedule_rx(&self);
    /// Give other tasks a chance to run between frames.
    fn yield_now(&self) {}
}

/// Bundle of collaborators shared by all queues.
#[derive(Clone)]
pub struct Host {
    /// Downstream MAC layer.
    pub mac: Arc<dyn MacLayer>,
    /// Upstream flow control.
    pub flow: Arc<dyn FlowControl>,
    /// Receive scheduler.
    pub scheduler: Arc<dyn RxScheduler>,
}

impl Host {
    /// Bundle the three collaborators.
    pub fn new(
        mac: Arc<dyn MacLayer>,
        flow: Arc<dyn FlowControl>,
        scheduler: Arc<dyn RxScheduler>,
    ) -> Self {
        Self {
            mac,
            flow,
            scheduler,
        }
    }
}
