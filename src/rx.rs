// Author: Lukas Bower
// Purpose: Drain received frames from the PIO receive FIFO under a bounded budget.

//! Receive queue.
//!
//! One pass of [`RxQueue::rx_work`] pulls at most `rx_budget` frames through
//! the `FRAMERDY`/`DATARDY` handshake. Bad frames are counted and dropped;
//! nothing that happens on the receive path is fatal. The FIFO lock covers
//! the handshake and data read of one frame; counters sit behind their own
//! lock so readers never wait on the device. Frames are handed to the MAC
//! layer after both are released.

use std::sync::Arc;

use log::{debug, trace};
use spin::Mutex;

use crate::config::PioConfig;
use crate::error::{InitError, RxError};
use crate::frame::{RxFrame, RX_HEADROOM};
use crate::hal::regs::{RxCtl, RxLayout, RXCTL};
use crate::hal::Bus;
use crate::header::{RxHeader, RxMacStatus, RX_HEADER_LEN};
use crate::mac::{MacLayer, RxScheduler};
use crate::transfer;

/// Receive path counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxStats {
    /// Frames delivered to the MAC layer.
    pub frames: u64,
    /// Frames dropped for a zero length.
    pub zero_length: u64,
    /// Frames dropped for exceeding the length limit.
    pub too_long: u64,
    /// Frames dropped for a failed FCS.
    pub fcs_failures: u64,
    /// Frames abandoned because data never became ready.
    pub timeouts: u64,
    /// Frames dropped for lack of memory.
    pub out_of_memory: u64,
    /// Passes that ended with the budget spent and frames still waiting.
    pub budget_exhausted: u64,
}

impl RxStats {
    fn record(&mut self, err: RxError) {
        let counter = match err {
            RxError::ZeroLength => &mut self.zero_length,
            RxError::TooLong { .. } => &mut self.too_long,
            RxError::FcsFailure => &mut self.fcs_failures,
            RxError::DataTimeout => &mut self.timeouts,
            RxError::OutOfMemory => &mut self.out_of_memory,
        };
        *counter += 1;
    }

    /// Frames dropped for any reason.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.zero_length + self.too_long + self.fcs_failures + self.timeouts + self.out_of_memory
    }
}

/// Outcome of one receive pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxWork {
    /// The FIFO reported no further frames.
    Drained,
    /// The budget ran out with frames pending; another pass was scheduled.
    Reschedule,
}

enum Pull {
    Idle,
    Frame(RxFrame),
    Dropped(RxError),
}

/// The PIO receive queue.
pub struct RxQueue<B> {
    bus: Arc<B>,
    window: u16,
    layout: RxLayout,
    pass_bad_fcs: bool,
    ready_polls: u32,
    poll_delay_us: u32,
    max_frame_len: u16,
    budget: usize,
    fifo: Mutex<()>,
    stats: Mutex<RxStats>,
}

impl<B: Bus> RxQueue<B> {
    /// Bind the receive window for the configured core revision.
    pub fn new(bus: Arc<B>, config: &PioConfig) -> Result<Self, InitError> {
        let revision = config.core_revision();
        let window = revision
            .rx_window(0)
            .ok_or(InitError::InvalidQueueIndex(0))?;
        Ok(Self {
            bus,
            window,
            layout: RxLayout::for_width(revision.transfer_width()),
            pass_bad_fcs: config.pass_bad_fcs,
            ready_polls: config.rx_ready_polls,
            poll_delay_us: config.rx_poll_delay_us,
            max_frame_len: config.rx_max_frame_len,
            budget: config.rx_budget.max(1),
            fifo: Mutex::new(()),
            stats: Mutex::new(RxStats::default()),
        })
    }

    /// Base of the receive register window.
    #[must_use]
    pub fn window(&self) -> u16 {
        self.window
    }

    /// Frames handled per pass.
    #[must_use]
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> RxStats {
        *self.stats.lock()
    }

    /// Whether the device reports a frame waiting.
    #[must_use]
    pub fn frame_ready(&self) -> bool {
        self.read_ctl().contains(RxCtl::FRAMERDY)
    }

    /// Drain up to the budget, delivering good frames to `mac`.
    ///
    /// Yields to `scheduler` between frames. If the budget runs out while the
    /// device still reports a frame, another pass is scheduled.
    pub fn rx_work(&self, mac: &dyn MacLayer, scheduler: &dyn RxScheduler) -> RxWork {
        for _ in 0..self.budget {
            let pulled = {
                let _fifo = self.fifo.lock();
                self.pull_frame()
            };
            match pulled {
                Pull::Idle => return RxWork::Drained,
                Pull::Frame(frame) => {
                    self.stats.lock().frames += 1;
                    trace!("[pio] rx frame of {} bytes", frame.payload().len());
                    mac.deliver_frame(frame);
                }
                Pull::Dropped(err) => {
                    self.stats.lock().record(err);
                    debug!("[pio] rx error: {err}");
                }
            }
            scheduler.yield_now();
        }

        if !self.frame_ready() {
            return RxWork::Drained;
        }
        self.stats.lock().budget_exhausted += 1;
        debug!("[pio] rx budget of {} frames spent, rescheduling", self.budget);
        scheduler.schedule_rx();
        RxWork::Reschedule
    }

    fn read_ctl(&self) -> RxCtl {
        RxCtl::from_bits_truncate(self.layout.width.read_reg(&*self.bus, self.window + RXCTL))
    }

    fn write_ctl(&self, ctl: RxCtl) {
        self.layout
            .width
            .write_reg(&*self.bus, self.window + RXCTL, ctl.bits());
    }

    fn wait_data_ready(&self) -> bool {
        for _ in 0..self.ready_polls {
            if self.read_ctl().contains(RxCtl::DATARDY) {
                return true;
            }
            self.bus.delay_us(self.poll_delay_us);
        }
        false
    }

    fn discard(&self, err: RxError) -> Pull {
        self.write_ctl(RxCtl::DATARDY);
        Pull::Dropped(err)
    }

    fn pull_frame(&self) -> Pull {
        if !self.read_ctl().contains(RxCtl::FRAMERDY) {
            return Pull::Idle;
        }
        self.write_ctl(RxCtl::FRAMERDY);
        if !self.wait_data_ready() {
            return Pull::Dropped(RxError::DataTimeout);
        }

        let width = self.layout.width;
        let data = self.window + self.layout.data;
        let mut raw = [0u8; RX_HEADER_LEN];
        transfer::read_block(&*self.bus, width, data, &mut raw);
        let header = RxHeader::parse(&raw);

        let len = header.frame_len;
        if len > self.max_frame_len {
            return self.discard(RxError::TooLong {
                len,
                max: self.max_frame_len,
            });
        }
        if len == 0 {
            return self.discard(RxError::ZeroLength);
        }
        if header.mac_status.contains(RxMacStatus::FCSERR) && !self.pass_bad_fcs {
            return self.discard(RxError::FcsFailure);
        }

        let padding = header.padding();
        let total = RX_HEADROOM + padding + usize::from(len);
        let mut buf = Vec::new();
        if buf.try_reserve_exact(total).is_err() {
            return self.discard(RxError::OutOfMemory);
        }
        buf.resize(total, 0);
        transfer::read_block(&*self.bus, width, data, &mut buf[RX_HEADROOM + padding..]);
        Pull::Frame(RxFrame::new(buf, padding, header))
    }
}
