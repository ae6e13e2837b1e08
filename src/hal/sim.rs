// Author: Lukas Bower
// Purpose: Model the PIO FIFOs of a wireless core so the engine can run without hardware.

//! Simulated PIO chip.
//!
//! [`SimBus`] decodes register offsets into the five TX windows and the RX
//! window of the configured core revision. TX data writes are reassembled
//! from the enabled byte lanes and committed as a frame on `EOF`. RX frames
//! are served through the `FRAMERDY`/`DATARDY` handshake; a stalled frame
//! never asserts `DATARDY`.

use std::collections::{HashMap, VecDeque};

use spin::Mutex;

use super::regs::{CoreRevision, RxCtl, RxLayout, TxLayout, RXCTL, TXCTL, TXQBUFSIZE};
use super::Bus;
use crate::transfer::TransferWidth;
use crate::types::TX_QUEUE_COUNT;

/// Raw `TXQBUFSIZE` reported until a test overrides it.
pub const DEFAULT_TXQBUFSIZE: u16 = 2048 + 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Tx(usize, u16),
    Rx(u16),
    Other,
}

#[derive(Debug, Default)]
struct SimTxQueue {
    ctl: u32,
    current: Vec<u8>,
    frames: Vec<Vec<u8>>,
    buffer_size: u16,
    suspended: bool,
}

#[derive(Debug)]
struct SimRxFrame {
    bytes: Vec<u8>,
    stalled: bool,
}

#[derive(Debug)]
struct ActiveRx {
    frame: SimRxFrame,
    pos: usize,
}

#[derive(Debug, Default)]
struct SimState {
    tx: Vec<SimTxQueue>,
    pending: VecDeque<SimRxFrame>,
    active: Option<ActiveRx>,
    discarded: usize,
    suspend_log: Vec<(usize, bool)>,
    delays: u64,
    other: HashMap<u16, u32>,
}

/// A host-side model of the PIO register file.
#[derive(Debug)]
pub struct SimBus {
    revision: CoreRevision,
    tx_layout: TxLayout,
    rx_layout: RxLayout,
    state: Mutex<SimState>,
}

impl SimBus {
    /// Chip for the given core revision.
    #[must_use]
    pub fn new(revision: u8) -> Self {
        let revision = CoreRevision::new(revision);
        let width = revision.transfer_width();
        let tx = (0..TX_QUEUE_COUNT)
            .map(|_| SimTxQueue {
                buffer_size: DEFAULT_TXQBUFSIZE,
                ..SimTxQueue::default()
            })
            .collect();
        Self {
            revision,
            tx_layout: TxLayout::for_width(width),
            rx_layout: RxLayout::for_width(width),
            state: Mutex::new(SimState {
                tx,
                ..SimState::default()
            }),
        }
    }

    /// Core revision the chip answers for.
    #[must_use]
    pub fn revision(&self) -> CoreRevision {
        self.revision
    }

    /// Set the raw `TXQBUFSIZE` value of queue `index`.
    pub fn set_tx_buffer_size(&self, index: usize, raw: u16) {
        if let Some(queue) = self.state.lock().tx.get_mut(index) {
            queue.buffer_size = raw;
        }
    }

    /// Queue a received frame: 20 header bytes followed by the payload.
    pub fn push_rx(&self, bytes: Vec<u8>) {
        self.state.lock().pending.push_back(SimRxFrame {
            bytes,
            stalled: false,
        });
    }

    /// Queue a frame whose data never becomes ready.
    pub fn push_stalled_rx(&self, bytes: Vec<u8>) {
        self.state.lock().pending.push_back(SimRxFrame {
            bytes,
            stalled: true,
        });
    }

    /// Frames not yet activated by a `FRAMERDY` acknowledgement.
    #[must_use]
    pub fn pending_rx(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Frames dropped through a `DATARDY` acknowledgement.
    #[must_use]
    pub fn discarded_rx(&self) -> usize {
        self.state.lock().discarded
    }

    /// Frames committed to TX queue `index`, header bytes included.
    #[must_use]
    pub fn tx_frames(&self, index: usize) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .tx
            .get(index)
            .map(|queue| queue.frames.clone())
            .unwrap_or_default()
    }

    /// Current TX control register of queue `index`.
    #[must_use]
    pub fn tx_ctl(&self, index: usize) -> u32 {
        self.state
            .lock()
            .tx
            .get(index)
            .map_or(0, |queue| queue.ctl)
    }

    /// Whether queue `index` has a suspend request latched.
    #[must_use]
    pub fn is_suspended(&self, index: usize) -> bool {
        self.state
            .lock()
            .tx
            .get(index)
            .is_some_and(|queue| queue.suspended)
    }

    /// Suspend-request transitions as `(queue index, suspended)` in write order.
    #[must_use]
    pub fn suspend_log(&self) -> Vec<(usize, bool)> {
        self.state.lock().suspend_log.clone()
    }

    /// Number of busy delays requested so far.
    #[must_use]
    pub fn delay_count(&self) -> u64 {
        self.state.lock().delays
    }

    fn decode(&self, offset: u16) -> Target {
        for index in 0..TX_QUEUE_COUNT {
            if let Some(window) = self.revision.tx_window(index) {
                if (window..window + 8).contains(&offset) {
                    return Target::Tx(index, offset - window);
                }
            }
        }
        match self.revision.rx_window(0) {
            Some(window) if (window..window + 8).contains(&offset) => Target::Rx(offset - window),
            _ => Target::Other,
        }
    }

    fn read(&self, offset: u16) -> u32 {
        let width = self.tx_layout.width;
        let mut state = self.state.lock();
        match self.decode(offset) {
            Target::Tx(index, reg) => {
                let queue = &state.tx[index];
                match reg {
                    TXCTL => queue.ctl,
                    TXQBUFSIZE if width == TransferWidth::Two => u32::from(queue.buffer_size),
                    _ => 0,
                }
            }
            Target::Rx(RXCTL) => {
                let mut ctl = RxCtl::empty();
                if !state.pending.is_empty() {
                    ctl |= RxCtl::FRAMERDY;
                }
                if state.active.as_ref().is_some_and(|rx| !rx.frame.stalled) {
                    ctl |= RxCtl::DATARDY;
                }
                ctl.bits()
            }
            Target::Rx(reg) if reg == self.rx_layout.data => state.read_rx_word(width),
            Target::Rx(_) => 0,
            Target::Other => state.other.get(&offset).copied().unwrap_or(0),
        }
    }

    fn write(&self, offset: u16, value: u32) {
        let layout = self.tx_layout;
        let mut state = self.state.lock();
        match self.decode(offset) {
            Target::Tx(index, TXCTL) => {
                let suspended = value & layout.suspend != 0;
                let queue = &mut state.tx[index];
                let toggled = queue.suspended != suspended;
                queue.suspended = suspended;
                if value & layout.eof != 0 && value & layout.fready != 0 {
                    let frame = core::mem::take(&mut queue.current);
                    queue.frames.push(frame);
                    queue.ctl = value & !(layout.eof | layout.fready);
                } else {
                    queue.ctl = value;
                }
                if toggled {
                    state.suspend_log.push((index, suspended));
                }
            }
            Target::Tx(index, reg) if reg == layout.data => {
                let queue = &mut state.tx[index];
                let lanes = layout.enabled_lanes(queue.ctl);
                queue
                    .current
                    .extend_from_slice(&value.to_le_bytes()[..lanes]);
            }
            Target::Tx(..) => {}
            Target::Rx(RXCTL) => {
                let ctl = RxCtl::from_bits_truncate(value);
                if ctl.contains(RxCtl::DATARDY) && state.active.take().is_some() {
                    state.discarded += 1;
                }
                if ctl.contains(RxCtl::FRAMERDY) {
                    state.active = state
                        .pending
                        .pop_front()
                        .map(|frame| ActiveRx { frame, pos: 0 });
                }
            }
            Target::Rx(_) => {}
            Target::Other => {
                state.other.insert(offset, value);
            }
        }
    }
}

impl SimState {
    fn read_rx_word(&mut self, width: TransferWidth) -> u32 {
        let Some(active) = self.active.as_mut() else {
            return 0;
        };
        if active.frame.stalled {
            return 0;
        }
        let mut raw = [0u8; 4];
        let start = active.pos.min(active.frame.bytes.len());
        let end = (start + width.bytes()).min(active.frame.bytes.len());
        raw[..end - start].copy_from_slice(&active.frame.bytes[start..end]);
        active.pos = start + width.bytes();
        if active.pos >= active.frame.bytes.len() {
            self.active = None;
        }
        u32::from_le_bytes(raw)
    }
}

impl Bus for SimBus {
    fn read16(&self, offset: u16) -> u16 {
        self.read(offset) as u16
    }

    fn read32(&self, offset: u16) -> u32 {
        self.read(offset)
    }

    fn write16(&self, offset: u16, value: u16) {
        self.write(offset, u32::from(value));
    }

    fn write32(&self, offset: u16, value: u32) {
        self.write(offset, value);
    }

    fn delay_us(&self, _micros: u32) {
        self.state.lock().delays += 1;
    }
}
