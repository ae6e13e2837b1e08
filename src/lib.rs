// Author: Lukas Bower
// Purpose: Expose the programmed-I/O packet transfer engine for DMA-less wireless cores.

//! Programmed-I/O packet transfer engine.
//!
//! Moves outbound and inbound link-layer frames between host memory and the
//! register windows of a wireless MAC core that has no usable DMA engine.
//! [`engine::PioEngine`] owns five transmit queues (four access categories
//! plus multicast) and one receive queue, correlates hardware completion
//! reports through a 16-bit [`cookie::Cookie`], and applies backpressure to
//! the upstream scheduler through [`mac::FlowControl`].
#![deny(unsafe_code)]

/// Register access and the simulated chip.
pub mod hal;

/// Bulk register transfers.
pub mod transfer;

/// Correlation cookie codec.
pub mod cookie;

/// Queue identities and transmit flags.
pub mod types;

/// Transport headers.
pub mod header;

/// Frame containers.
pub mod frame;

/// Collaborator interfaces.
pub mod mac;

/// Transmit queues.
pub mod tx;

/// Receive queue.
pub mod rx;

/// Priority class routing.
pub mod select;

/// Engine lifecycle.
pub mod engine;

/// Engine configuration.
pub mod config;

/// Error taxonomy.
pub mod error;

#[cfg(test)]
mod testutil;

pub use config::PioConfig;
pub use cookie::Cookie;
pub use engine::PioEngine;
pub use error::{
    CompletionError, CookieError, HeaderError, InitError, RxError, SubmitError, SubmitRejected,
};
pub use frame::{RxFrame, TxFrame, TxOutcome, TxReport, TxStatus};
pub use hal::Bus;
pub use mac::{FlowControl, Host, MacLayer, RxScheduler};
pub use rx::{RxStats, RxWork};
pub use tx::{TxQueueStats, MAX_TX_SLOTS};
pub use types::{QueueId, TxFlags};
