// Author: Lukas Bower
// Purpose: Carry the tunables of the PIO engine and their environment overrides.

//! Engine configuration.

use log::warn;

use crate::hal::regs::CoreRevision;
use crate::tx::MAX_TX_SLOTS;

/// Hard upper bound on a received frame length.
pub const DEFAULT_RX_MAX_FRAME_LEN: u16 = 0x700;
/// Frames handled per receive work invocation.
pub const DEFAULT_RX_BUDGET: usize = 50;
/// Per-queue TX buffer size assumed on revision 8 and newer.
///
/// Not derived from hardware; verify against the target core.
pub const DEFAULT_REV8_BUFFER_SIZE: u32 = 1920;
/// Bytes subtracted from `TXQBUFSIZE` on older cores.
pub const DEFAULT_BUFFER_RESERVE: u32 = 80;

/// Tunables for [`crate::engine::PioEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PioConfig {
    /// Core revision of the wireless MAC.
    pub revision: u8,
    /// Map priority classes to separate queues; otherwise everything goes best-effort.
    pub qos: bool,
    /// Deliver frames whose FCS check failed.
    pub pass_bad_fcs: bool,
    /// Packet slots per TX queue.
    pub tx_slots: usize,
    /// Override for the per-queue TX buffer size in bytes.
    pub tx_buffer_size: Option<u32>,
    /// Buffer size used on revision 8 and newer when not overridden.
    pub rev8_buffer_size: u32,
    /// Reserve subtracted from `TXQBUFSIZE` on older cores.
    pub buffer_reserve: u32,
    /// Frames per receive work invocation.
    pub rx_budget: usize,
    /// Data-ready polls per frame.
    pub rx_ready_polls: u32,
    /// Delay between data-ready polls in microseconds.
    pub rx_poll_delay_us: u32,
    /// Largest accepted RX frame length.
    pub rx_max_frame_len: u16,
}

impl Default for PioConfig {
    fn default() -> Self {
        Self {
            revision: 5,
            qos: true,
            pass_bad_fcs: false,
            tx_slots: MAX_TX_SLOTS,
            tx_buffer_size: None,
            rev8_buffer_size: DEFAULT_REV8_BUFFER_SIZE,
            buffer_reserve: DEFAULT_BUFFER_RESERVE,
            rx_budget: DEFAULT_RX_BUDGET,
            rx_ready_polls: 10,
            rx_poll_delay_us: 10,
            rx_max_frame_len: DEFAULT_RX_MAX_FRAME_LEN,
        }
    }
}

impl PioConfig {
    /// Defaults for a given core revision.
    #[must_use]
    pub fn for_revision(revision: u8) -> Self {
        Self {
            revision,
            ..Self::default()
        }
    }

    /// Defaults overlaid with `WLAN_PIO_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `WLAN_PIO_QOS`, `WLAN_PIO_PASS_BAD_FCS`, `WLAN_PIO_RX_BUDGET`
    /// and `WLAN_PIO_TX_BUFFER_SIZE` if set. Unparseable values are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(qos) = env_flag("WLAN_PIO_QOS") {
            self.qos = qos;
        }
        if let Some(pass) = env_flag("WLAN_PIO_PASS_BAD_FCS") {
            self.pass_bad_fcs = pass;
        }
        if let Some(budget) = env_number("WLAN_PIO_RX_BUDGET") {
            self.rx_budget = budget;
        }
        if let Some(size) = env_number("WLAN_PIO_TX_BUFFER_SIZE") {
            self.tx_buffer_size = Some(size);
        }
        self
    }

    /// Set the core revision.
    #[must_use]
    pub fn with_revision(mut self, revision: u8) -> Self {
        self.revision = revision;
        self
    }

    /// Enable or disable priority queueing.
    #[must_use]
    pub fn with_qos(mut self, qos: bool) -> Self {
        self.qos = qos;
        self
    }

    /// Deliver frames with a failed FCS.
    #[must_use]
    pub fn with_pass_bad_fcs(mut self, pass: bool) -> Self {
        self.pass_bad_fcs = pass;
        self
    }

    /// Set the number of packet slots per TX queue.
    #[must_use]
    pub fn with_tx_slots(mut self, slots: usize) -> Self {
        self.tx_slots = slots;
        self
    }

    /// Pin the per-queue TX buffer size.
    #[must_use]
    pub fn with_tx_buffer_size(mut self, bytes: u32) -> Self {
        self.tx_buffer_size = Some(bytes);
        self
    }

    /// Set the receive work budget.
    #[must_use]
    pub fn with_rx_budget(mut self, budget: usize) -> Self {
        self.rx_budget = budget;
        self
    }

    /// Core revision as a typed value.
    #[must_use]
    pub fn core_revision(&self) -> CoreRevision {
        CoreRevision::new(self.revision)
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!("[pio] ignoring {key}={raw:?}: expected a boolean");
            None
        }
    }
}

fn env_number<T: core::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("[pio] ignoring {key}={raw:?}: expected a number");
            None
        }
    }
}
