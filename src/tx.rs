// Author: Lukas Bower
// Purpose: Own the packet slots and buffer budget of one PIO transmit queue.

//! Transmit queue.
//!
//! Each queue owns a fixed arena of packet slots with an index free list and
//! a byte budget mirroring the device-side FIFO. All bookkeeping, every
//! access to the queue's register window and every flow-control signal
//! happens under the queue lock, so upstream sees stop and resume in the
//! order the queue changed state. Completion callbacks run after the lock is
//! released.

use core::fmt;
use std::sync::Arc;

use heapless::{Deque, Vec as HeaplessVec};
use log::{debug, error, trace, warn};
use spin::Mutex;

use crate::config::PioConfig;
use crate::cookie::Cookie;
use crate::error::{CompletionError, HeaderError, InitError, SubmitError, SubmitRejected};
use crate::frame::{TxFrame, TxReport, TxStatus};
use crate::hal::regs::{TxLayout, TXCTL, TXQBUFSIZE};
use crate::hal::Bus;
use crate::header::{TxHeaderBuf, MAX_TX_HEADER_LEN};
use crate::mac::{FlowControl, Host, MacLayer};
use crate::transfer;
use crate::types::{QueueId, TxFlags};

/// Packet slots per queue.
pub const MAX_TX_SLOTS: usize = 32;
/// Smallest frame worth keeping the queue open for: frame control, duration, one address.
pub const MIN_FRAME_LEN: usize = 2 + 2 + 6;

/// Round a byte count up to the 4-byte FIFO granularity.
#[must_use]
pub const fn round_up(len: usize) -> usize {
    (len + 3) & !3
}

fn wire_size(len: usize) -> u32 {
    u32::try_from(round_up(len)).unwrap_or(u32::MAX)
}

#[derive(Default)]
struct TxSlot {
    frame: Option<TxFrame>,
    reserved: u32,
}

struct TxState {
    slots: HeaplessVec<TxSlot, MAX_TX_SLOTS>,
    free: Deque<u8, MAX_TX_SLOTS>,
    buffer_used: u32,
    stopped: bool,
    tx_count: u64,
    class: u8,
}

/// Per-class statistics reported by [`crate::engine::PioEngine::tx_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxQueueStats {
    /// Slots currently holding a frame.
    pub len: usize,
    /// Slots owned by the queue.
    pub limit: usize,
    /// Frames completed by hardware.
    pub count: u64,
}

/// Consistent view of a queue's bookkeeping taken under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSnapshot {
    /// Slots on the free list.
    pub free_slots: usize,
    /// Slots holding a frame.
    pub occupied_slots: usize,
    /// Bytes reserved in the device buffer.
    pub buffer_used: u32,
    /// Sum of the reservations held by occupied slots.
    pub reserved_by_slots: u32,
    /// Backpressure state.
    pub stopped: bool,
    /// Frames completed by hardware.
    pub tx_count: u64,
}

/// One PIO transmit queue.
pub struct TxQueue<B> {
    id: QueueId,
    bus: Arc<B>,
    window: u16,
    layout: TxLayout,
    capacity: u32,
    slot_count: usize,
    header_len: usize,
    mac: Arc<dyn MacLayer>,
    flow: Arc<dyn FlowControl>,
    state: Mutex<TxState>,
}

impl<B: Bus> TxQueue<B> {
    /// Build queue `id`, sizing its buffer from configuration or the `TXQBUFSIZE` register.
    pub fn new(id: QueueId, bus: Arc<B>, config: &PioConfig, host: &Host) -> Result<Self, InitError> {
        let revision = config.core_revision();
        let window = revision
            .tx_window(id.index())
            .ok_or(InitError::InvalidQueueIndex(id.index()))?;
        if config.tx_slots == 0 || config.tx_slots > MAX_TX_SLOTS {
            return Err(InitError::InvalidSlotCount {
                requested: config.tx_slots,
                max: MAX_TX_SLOTS,
            });
        }
        let header_len = host.mac.tx_header_len();
        if header_len > MAX_TX_HEADER_LEN {
            return Err(InitError::HeaderTooLong {
                len: header_len,
                max: MAX_TX_HEADER_LEN,
            });
        }

        let layout = TxLayout::for_width(revision.transfer_width());
        let capacity = match config.tx_buffer_size {
            Some(size) => size,
            None if revision.has_fixed_buffer_size() => config.rev8_buffer_size,
            None => {
                let raw = u32::from(bus.read16(window + TXQBUFSIZE));
                raw.checked_sub(config.buffer_reserve)
                    .ok_or(InitError::BufferSizeUnusable { queue: id, raw })?
            }
        };
        if capacity == 0 {
            return Err(InitError::BufferSizeUnusable {
                queue: id,
                raw: capacity,
            });
        }

        let mut slots = HeaplessVec::new();
        let mut free = Deque::new();
        for index in 0..config.tx_slots {
            let overflow = InitError::InvalidSlotCount {
                requested: config.tx_slots,
                max: MAX_TX_SLOTS,
            };
            slots.push(TxSlot::default()).map_err(|_| overflow)?;
            free.push_back(index as u8).map_err(|_| overflow)?;
        }

        debug!(
            "[pio] {}: window {:#05x} buffer {} bytes, {} slots",
            id.label(),
            window,
            capacity,
            config.tx_slots
        );
        Ok(Self {
            id,
            bus,
            window,
            layout,
            capacity,
            slot_count: config.tx_slots,
            header_len,
            mac: host.mac.clone(),
            flow: host.flow.clone(),
            state: Mutex::new(TxState {
                slots,
                free,
                buffer_used: 0,
                stopped: false,
                tx_count: 0,
                class: 0,
            }),
        })
    }

    /// Queue identity.
    #[must_use]
    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Base of the queue's TX register window.
    #[must_use]
    pub fn window(&self) -> u16 {
        self.window
    }

    /// Device buffer size in bytes.
    #[must_use]
    pub fn buffer_capacity(&self) -> u32 {
        self.capacity
    }

    /// Packet slots owned by the queue.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Transport header length prepended to every frame.
    #[must_use]
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Bytes currently reserved by in-flight frames.
    #[must_use]
    pub fn buffer_used(&self) -> u32 {
        self.state.lock().buffer_used
    }

    /// Slots on the free list.
    #[must_use]
    pub fn free_slots(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Whether upstream has been told to stop feeding this queue.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Frames completed by hardware.
    #[must_use]
    pub fn tx_count(&self) -> u64 {
        self.state.lock().tx_count
    }

    /// Occupancy and completion counters.
    #[must_use]
    pub fn stats(&self) -> TxQueueStats {
        let state = self.state.lock();
        TxQueueStats {
            len: self.slot_count - state.free.len(),
            limit: self.slot_count,
            count: state.tx_count,
        }
    }

    /// Bookkeeping snapshot.
    #[must_use]
    pub fn snapshot(&self) -> TxSnapshot {
        let state = self.state.lock();
        let occupied = state.slots.iter().filter(|slot| slot.frame.is_some());
        TxSnapshot {
            free_slots: state.free.len(),
            occupied_slots: occupied.clone().count(),
            buffer_used: state.buffer_used,
            reserved_by_slots: occupied.map(|slot| slot.reserved).sum(),
            stopped: state.stopped,
            tx_count: state.tx_count,
        }
    }

    fn stop_threshold(&self) -> u32 {
        wire_size(self.header_len + MIN_FRAME_LEN)
    }

    fn has_headroom(&self, state: &TxState) -> bool {
        !state.free.is_empty() && self.capacity - state.buffer_used >= self.stop_threshold()
    }

    /// Accept `frame` for transmission.
    ///
    /// On failure the untouched frame is handed back. `InsufficientBuffer`
    /// also stops the queue and signals upstream.
    pub fn submit(&self, frame: TxFrame) -> Result<(), SubmitRejected> {
        let needed = wire_size(self.header_len + frame.len());
        if needed > self.capacity {
            debug!(
                "[pio] {}: tx frame of {} bytes longer than queue",
                self.id.label(),
                needed
            );
            return Err(SubmitRejected::new(
                SubmitError::FrameTooLarge {
                    len: needed,
                    capacity: self.capacity,
                },
                frame,
            ));
        }

        let mut state = self.state.lock();
        let Some(slot) = state.free.front().copied() else {
            drop(state);
            warn!("[pio] {}: tx packet overflow", self.id.label());
            return Err(SubmitRejected::new(SubmitError::NoSlots, frame));
        };
        debug_assert!(state.buffer_used <= self.capacity);
        let available = self.capacity - state.buffer_used;
        if needed > available {
            state.class = frame.class();
            if !state.stopped {
                state.stopped = true;
                debug!(
                    "[pio] {}: stopped, {} bytes needed {} free",
                    self.id.label(),
                    needed,
                    available
                );
                self.flow.queue_stopped(state.class);
            }
            drop(state);
            return Err(SubmitRejected::new(
                SubmitError::InsufficientBuffer { needed, available },
                frame,
            ));
        }

        let cookie = Cookie::for_slot(self.id, u16::from(slot));
        let mut header = TxHeaderBuf::new();
        match self.mac.build_tx_header(&frame, cookie, &mut header) {
            Ok(()) if header.len() != self.header_len => {
                drop(state);
                let err = HeaderError::LengthMismatch {
                    expected: self.header_len,
                    actual: header.len(),
                };
                error!("[pio] {}: tx header generation failed: {err}", self.id.label());
                return Err(SubmitRejected::new(SubmitError::Header(err), frame));
            }
            Ok(()) => {}
            Err(HeaderError::MissingKey) => {
                drop(state);
                debug!("[pio] {}: dropping frame, key missing", self.id.label());
                let report = TxReport::dropped(self.id, frame.len());
                self.finish(frame, &report);
                return Ok(());
            }
            Err(err) => {
                drop(state);
                error!("[pio] {}: tx header generation failed: {err}", self.id.label());
                return Err(SubmitRejected::new(SubmitError::Header(err), frame));
            }
        }

        if frame.flags().contains(TxFlags::SEND_AFTER_DTIM) {
            self.mac.announce_multicast_cookie(cookie);
        }
        self.write_frame(&header, frame.data());

        state.free.pop_front();
        state.class = frame.class();
        state.buffer_used += needed;
        let record = &mut state.slots[usize::from(slot)];
        assert!(record.frame.is_none(), "tx slot {slot} handed out twice");
        record.reserved = needed;
        record.frame = Some(frame);
        trace!("[pio] {}: queued {:?}", self.id.label(), cookie);

        if !state.stopped && !self.has_headroom(&state) {
            state.stopped = true;
            debug!("[pio] {}: full, stopping class {}", self.id.label(), state.class);
            self.flow.queue_stopped(state.class);
        }
        Ok(())
    }

    /// Retire the frame in `slot` with the hardware `status`.
    pub fn complete(&self, slot: usize, status: &TxStatus) -> Result<(), CompletionError> {
        let not_in_flight = CompletionError::SlotNotInFlight {
            queue: self.id,
            slot,
        };
        let mut state = self.state.lock();
        let (frame, reserved) = match state.slots.get_mut(slot) {
            Some(record) => match record.frame.take() {
                Some(frame) => (frame, core::mem::take(&mut record.reserved)),
                None => return Err(not_in_flight),
            },
            None => return Err(not_in_flight),
        };
        debug_assert!(state.buffer_used >= reserved);
        state.buffer_used = state.buffer_used.saturating_sub(reserved);
        if state.free.push_back(slot as u8).is_err() {
            unreachable!("tx free list overflow on {}", self.id.label());
        }
        state.tx_count += 1;
        if state.stopped && self.has_headroom(&state) {
            state.stopped = false;
            debug!("[pio] {}: resuming class {}", self.id.label(), state.class);
            self.flow.queue_resumed(state.class);
        }
        drop(state);

        let report = TxReport::from_status(self.id, frame.len(), status);
        self.finish(frame, &report);
        Ok(())
    }

    /// Ask the device to stop consuming this queue.
    pub fn suspend(&self) {
        self.update_ctl(|ctl, suspend| ctl | suspend);
    }

    /// Let the device continue consuming this queue.
    pub fn resume(&self) {
        self.update_ctl(|ctl, suspend| ctl & !suspend);
    }

    /// Release every in-flight frame without running its callback.
    ///
    /// Returns the number of frames released. The queue is left empty and
    /// ready for reuse.
    pub fn cancel_frames(&self) -> usize {
        let mut state = self.state.lock();
        let mut released = 0;
        for index in 0..state.slots.len() {
            if state.slots[index].frame.take().is_some() {
                state.slots[index].reserved = 0;
                if state.free.push_back(index as u8).is_err() {
                    unreachable!("tx free list overflow on {}", self.id.label());
                }
                released += 1;
            }
        }
        state.buffer_used = 0;
        state.stopped = false;
        released
    }

    fn update_ctl(&self, apply: impl FnOnce(u32, u32) -> u32) {
        let _state = self.state.lock();
        let width = self.layout.width;
        let reg = self.window + TXCTL;
        let ctl = width.read_reg(&*self.bus, reg);
        width.write_reg(&*self.bus, reg, apply(ctl, self.layout.suspend));
    }

    fn write_frame(&self, header: &[u8], payload: &[u8]) {
        let width = self.layout.width;
        let reg = self.window + TXCTL;
        let mut ctl = width.read_reg(&*self.bus, reg);
        ctl |= self.layout.fready;
        ctl &= !self.layout.eof;
        ctl = self.write_chunk(ctl, header);
        ctl = self.write_chunk(ctl, payload);
        ctl |= self.layout.eof;
        width.write_reg(&*self.bus, reg, ctl);
    }

    fn write_chunk(&self, ctl: u32, data: &[u8]) -> u32 {
        let width = self.layout.width;
        let reg = self.window + TXCTL;
        let lanes = self.layout.all_lanes();
        let mut ctl = ctl | lanes;
        width.write_reg(&*self.bus, reg, ctl);
        transfer::write_block(
            &*self.bus,
            width,
            self.window + self.layout.data,
            data,
            |tail| {
                ctl = (ctl & !lanes) | self.layout.lane_mask(tail);
                width.write_reg(&*self.bus, reg, ctl);
            },
        );
        ctl
    }

    fn finish(&self, mut frame: TxFrame, report: &TxReport) {
        if let Some(callback) = frame.take_completion() {
            callback(report);
        }
        self.mac.report_tx_outcome(frame, report);
    }
}

impl<B> fmt::Debug for TxQueue<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxQueue")
            .field("id", &self.id)
            .field("window", &format_args!("{:#05x}", self.window))
            .field("capacity", &self.capacity)
            .field("slot_count", &self.slot_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimBus;
    use crate::header::BASIC_TX_HEADER_LEN;
    use crate::testutil::{init_logging, Harness};
    use crate::types::TxFlags;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn queue(config: &PioConfig, harness: &Harness) -> (Arc<SimBus>, TxQueue<SimBus>) {
        let bus = Arc::new(SimBus::new(config.revision));
        let queue = TxQueue::new(QueueId::BestEffort, bus.clone(), config, &harness.host).unwrap();
        (bus, queue)
    }

    fn cookie_slot(bus: &SimBus, index: usize, frame: usize) -> usize {
        let bytes = &bus.tx_frames(index)[frame];
        usize::from(u16::from_le_bytes([bytes[2], bytes[3]]) & 0x0fff)
    }

    #[test]
    fn buffer_size_comes_from_register_minus_reserve() {
        init_logging();
        let harness = Harness::new();
        let bus = Arc::new(SimBus::new(5));
        bus.set_tx_buffer_size(QueueId::Video.index(), 1000);
        let queue =
            TxQueue::new(QueueId::Video, bus, &PioConfig::default(), &harness.host).unwrap();
        assert_eq!(queue.buffer_capacity(), 920);
        assert_eq!(queue.window(), 0x320);
    }

    #[test]
    fn unusable_register_size_fails_construction() {
        let harness = Harness::new();
        let bus = Arc::new(SimBus::new(5));
        bus.set_tx_buffer_size(QueueId::Voice.index(), 40);
        let err = TxQueue::new(QueueId::Voice, bus, &PioConfig::default(), &harness.host)
            .unwrap_err();
        assert_eq!(
            err,
            InitError::BufferSizeUnusable {
                queue: QueueId::Voice,
                raw: 40
            }
        );
    }

    #[test]
    fn rev8_uses_configured_constant() {
        let harness = Harness::new();
        let (_bus, queue) = queue(&PioConfig::for_revision(8), &harness);
        assert_eq!(queue.buffer_capacity(), 1920);
    }

    #[test]
    fn submit_writes_header_then_payload_with_eof() {
        init_logging();
        let harness = Harness::new();
        let (bus, queue) = queue(&PioConfig::default(), &harness);
        queue.submit(TxFrame::new(vec![0x11; 7], 2)).unwrap();

        let frames = bus.tx_frames(QueueId::BestEffort.index());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), BASIC_TX_HEADER_LEN + 7);
        assert_eq!(&frames[0][BASIC_TX_HEADER_LEN..], &[0x11; 7]);
        assert_eq!(&frames[0][2..4], &0x2000u16.to_le_bytes());
        assert_eq!(queue.buffer_used(), round_up(BASIC_TX_HEADER_LEN + 7) as u32);
        assert_eq!(queue.free_slots(), MAX_TX_SLOTS - 1);
        assert_eq!(queue.tx_count(), 0);
    }

    #[test]
    fn free_list_is_served_in_fifo_order() {
        let harness = Harness::new();
        let (bus, queue) = queue(&PioConfig::default(), &harness);
        let index = QueueId::BestEffort.index();
        queue.submit(TxFrame::new(vec![0; 20], 2)).unwrap();
        queue.submit(TxFrame::new(vec![0; 20], 2)).unwrap();
        queue.complete(0, &TxStatus::new(0x2000, true)).unwrap();
        queue.submit(TxFrame::new(vec![0; 20], 2)).unwrap();
        assert_eq!(cookie_slot(&bus, index, 0), 0);
        assert_eq!(cookie_slot(&bus, index, 1), 1);
        assert_eq!(cookie_slot(&bus, index, 2), 2);
    }

    #[test]
    fn completion_runs_callback_once_and_counts() {
        let harness = Harness::new();
        let (_bus, queue) = queue(&PioConfig::default(), &harness);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let frame = TxFrame::new(vec![1; 64], 2).on_complete(move |report| {
            assert_eq!(report.bytes, 64);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        queue.submit(frame).unwrap();
        queue.complete(0, &TxStatus::new(0x2000, true)).unwrap();
        assert_eq!(
            queue.complete(0, &TxStatus::new(0x2000, true)),
            Err(CompletionError::SlotNotInFlight {
                queue: QueueId::BestEffort,
                slot: 0
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.tx_count(), 1);
        assert_eq!(harness.mac.reports.lock().unwrap().len(), 1);
    }

    #[test]
    fn completion_callback_may_query_the_queue() {
        let harness = Harness::new();
        let config = PioConfig::default().with_tx_slots(1);
        let bus = Arc::new(SimBus::new(config.revision));
        let queue =
            Arc::new(TxQueue::new(QueueId::BestEffort, bus, &config, &harness.host).unwrap());
        let observed = Arc::new(AtomicUsize::new(usize::MAX));
        let (seen, inner) = (observed.clone(), queue.clone());
        let frame = TxFrame::new(vec![0; 24], 2).on_complete(move |_| {
            seen.store(inner.stats().len, Ordering::SeqCst);
            assert!(!inner.is_stopped());
        });
        queue.submit(frame).unwrap();
        queue.complete(0, &TxStatus::new(0x2000, true)).unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 0);
        assert_eq!(
            *harness.flow.events.lock().unwrap(),
            vec![(false, 2), (true, 2)]
        );
    }

    #[test]
    fn filling_the_last_slot_stops_preemptively() {
        let harness = Harness::new();
        let config = PioConfig::default().with_tx_slots(2);
        let (_bus, queue) = queue(&config, &harness);
        queue.submit(TxFrame::new(vec![0; 10], 1)).unwrap();
        assert!(!queue.is_stopped());
        queue.submit(TxFrame::new(vec![0; 10], 1)).unwrap();
        assert!(queue.is_stopped());
        assert_eq!(*harness.flow.events.lock().unwrap(), vec![(false, 1)]);

        queue.complete(1, &TxStatus::new(0x2001, false)).unwrap();
        assert!(!queue.is_stopped());
        assert_eq!(
            *harness.flow.events.lock().unwrap(),
            vec![(false, 1), (true, 1)]
        );
    }

    #[test]
    fn missing_key_drops_without_consuming_a_slot() {
        let harness = Harness::new();
        *harness.mac.missing_key.lock().unwrap() = true;
        let (bus, queue) = queue(&PioConfig::default(), &harness);
        queue
            .submit(TxFrame::new(vec![0; 32], 2).with_flags(TxFlags::empty()))
            .unwrap();
        assert_eq!(queue.free_slots(), MAX_TX_SLOTS);
        assert_eq!(queue.buffer_used(), 0);
        assert!(bus.tx_frames(QueueId::BestEffort.index()).is_empty());
        let reports = harness.mac.reports.lock().unwrap();
        assert_eq!(reports[0].1.outcome, crate::frame::TxOutcome::Dropped);
    }

    #[test]
    fn suspend_toggles_request_bit_only() {
        let harness = Harness::new();
        let (bus, queue) = queue(&PioConfig::for_revision(11), &harness);
        queue.suspend();
        assert!(bus.is_suspended(QueueId::BestEffort.index()));
        queue.resume();
        assert!(!bus.is_suspended(QueueId::BestEffort.index()));
    }

    #[test]
    fn cancel_releases_frames_silently() {
        let harness = Harness::new();
        let (_bus, queue) = queue(&PioConfig::default(), &harness);
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let seen = calls.clone();
            queue
                .submit(TxFrame::new(vec![0; 100], 2).on_complete(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }
        assert_eq!(queue.cancel_frames(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(harness.mac.reports.lock().unwrap().is_empty());
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.free_slots, MAX_TX_SLOTS);
        assert_eq!(snapshot.buffer_used, 0);
    }
}
