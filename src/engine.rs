// Author: Lukas Bower
// Purpose: Own the PIO transmit and receive queues and coordinate their lifecycle.

//! PIO engine.
//!
//! [`PioEngine`] builds the five transmit queues and the receive queue for
//! one device, routes outbound frames, resolves hardware completion reports
//! through the cookie codec, and brackets power-state transitions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use heapless::Vec as HeaplessVec;
use log::{debug, info, warn};

use crate::config::PioConfig;
use crate::error::{CompletionError, InitError, SubmitRejected};
use crate::frame::{TxFrame, TxStatus};
use crate::hal::Bus;
use crate::mac::Host;
use crate::rx::{RxQueue, RxStats, RxWork};
use crate::select;
use crate::tx::{TxQueue, TxQueueStats};
use crate::types::{QueueId, TX_QUEUE_COUNT};

/// Priority classes reported by [`PioEngine::tx_stats`].
pub const PRIORITY_CLASSES: usize = 4;

const SUSPEND_ORDER: [QueueId; TX_QUEUE_COUNT] = [
    QueueId::Background,
    QueueId::BestEffort,
    QueueId::Video,
    QueueId::Voice,
    QueueId::Multicast,
];

const RESUME_ORDER: [QueueId; TX_QUEUE_COUNT] = [
    QueueId::Multicast,
    QueueId::Voice,
    QueueId::Video,
    QueueId::BestEffort,
    QueueId::Background,
];

/// PIO transfer engine for one device.
pub struct PioEngine<B> {
    config: PioConfig,
    host: Host,
    tx: HeaplessVec<TxQueue<B>, TX_QUEUE_COUNT>,
    rx: RxQueue<B>,
    rx_stopped: AtomicBool,
}

impl<B: Bus> PioEngine<B> {
    /// Build every queue in order: background, best-effort, video, voice,
    /// multicast, then receive.
    ///
    /// If a step fails, the queues built so far are torn down in reverse
    /// order before the error is returned.
    pub fn init(bus: Arc<B>, config: PioConfig, host: Host) -> Result<Self, InitError> {
        let mut tx: HeaplessVec<TxQueue<B>, TX_QUEUE_COUNT> = HeaplessVec::new();
        let built = QueueId::ALL.into_iter().try_for_each(|id| {
            let queue = TxQueue::new(id, bus.clone(), &config, &host)?;
            tx.push(queue)
                .map_err(|_| InitError::InvalidQueueIndex(id.index()))
        });
        let rx = built.and_then(|()| RxQueue::new(bus.clone(), &config));
        let rx = match rx {
            Ok(rx) => rx,
            Err(err) => {
                warn!("[pio] init failed: {err}");
                while let Some(queue) = tx.pop() {
                    debug!("[pio] {}: torn down", queue.id().label());
                }
                return Err(err);
            }
        };

        info!(
            "[pio] engine up: core rev {}, {}-byte transfers, qos {}",
            config.revision,
            config.core_revision().transfer_width().bytes(),
            if config.qos { "on" } else { "off" }
        );
        Ok(Self {
            config,
            host,
            tx,
            rx,
            rx_stopped: AtomicBool::new(false),
        })
    }

    /// Configuration the engine was built with.
    #[must_use]
    pub fn config(&self) -> &PioConfig {
        &self.config
    }

    /// Transmit queue `id`.
    #[must_use]
    pub fn queue(&self, id: QueueId) -> &TxQueue<B> {
        &self.tx[id.index()]
    }

    /// Receive queue.
    #[must_use]
    pub fn rx_queue(&self) -> &RxQueue<B> {
        &self.rx
    }

    /// Transmit queue serving priority class `class`.
    #[must_use]
    pub fn select(&self, class: u8) -> &TxQueue<B> {
        self.queue(select::queue_for_class(class, self.config.qos))
    }

    /// Route and submit an outbound frame.
    ///
    /// Frames held for the DTIM beacon go to the multicast queue with the
    /// More-Data bit set. A rejected frame comes back with its frame control
    /// field as it was submitted.
    pub fn submit(&self, mut frame: TxFrame) -> Result<(), SubmitRejected> {
        let id = select::route(frame.class(), frame.flags(), self.config.qos);
        let marked = id == QueueId::Multicast && frame.set_more_data();
        self.queue(id).submit(frame).map_err(|mut rejected| {
            if marked {
                rejected.frame.clear_more_data();
            }
            rejected
        })
    }

    /// Resolve a hardware completion report.
    ///
    /// Reports that cannot be matched to an in-flight frame are logged and
    /// dropped; queue state is left untouched.
    pub fn handle_tx_status(&self, status: &TxStatus) -> Result<(), CompletionError> {
        let (id, slot) = match status.cookie.decode(self.config.tx_slots) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("[pio] dropping tx status for {:?}: {err}", status.cookie);
                return Err(err.into());
            }
        };
        self.queue(id).complete(slot, status).map_err(|err| {
            warn!("[pio] dropping tx status for {:?}: {err}", status.cookie);
            err
        })
    }

    /// Receive interrupt: schedule a receive pass unless the engine is stopped.
    pub fn rx_interrupt(&self) {
        if !self.rx_stopped.load(Ordering::Acquire) {
            self.host.scheduler.schedule_rx();
        }
    }

    /// Run one receive pass.
    pub fn rx_work(&self) -> RxWork {
        if self.rx_stopped.load(Ordering::Acquire) {
            debug!("[pio] rx work skipped, engine stopped");
            return RxWork::Drained;
        }
        self.rx.rx_work(&*self.host.mac, &*self.host.scheduler)
    }

    /// Stop receive processing ahead of teardown.
    pub fn stop(&self) {
        if !self.rx_stopped.swap(true, Ordering::AcqRel) {
            info!("[pio] rx stopped");
        }
    }

    /// Keep the radio awake and suspend every transmit queue.
    pub fn suspend_all(&self) {
        self.host.mac.set_awake(true);
        for id in SUSPEND_ORDER {
            self.queue(id).suspend();
        }
        debug!("[pio] tx queues suspended");
    }

    /// Resume every transmit queue and release the radio to power saving.
    pub fn resume_all(&self) {
        for id in RESUME_ORDER {
            self.queue(id).resume();
        }
        self.host.mac.set_awake(false);
        debug!("[pio] tx queues resumed");
    }

    /// Occupancy and completion counts for priority classes `0..PRIORITY_CLASSES`.
    #[must_use]
    pub fn tx_stats(&self) -> [TxQueueStats; PRIORITY_CLASSES] {
        let mut stats = [TxQueueStats::default(); PRIORITY_CLASSES];
        for (class, entry) in stats.iter_mut().enumerate() {
            *entry = self.select(class as u8).stats();
        }
        stats
    }

    /// Receive counters.
    #[must_use]
    pub fn rx_stats(&self) -> RxStats {
        self.rx.stats()
    }

    /// Release the engine.
    ///
    /// Receive processing stops first, then every in-flight frame is released
    /// without running its callback, multicast queue first and background
    /// last. Returns the number of frames released.
    pub fn teardown(mut self) -> usize {
        self.stop();
        let mut released = 0;
        while let Some(queue) = self.tx.pop() {
            let count = queue.cancel_frames();
            if count > 0 {
                debug!("[pio] {}: released {} in-flight frames", queue.id().label(), count);
            }
            released += count;
        }
        info!("[pio] engine down, {released} frames released");
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CookieError;
    use crate::hal::sim::SimBus;
    use crate::testutil::{init_logging, Harness};

    fn engine(config: PioConfig, harness: &Harness) -> (Arc<SimBus>, PioEngine<SimBus>) {
        let bus = Arc::new(SimBus::new(config.revision));
        let engine = PioEngine::init(bus.clone(), config, harness.host.clone()).unwrap();
        (bus, engine)
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PioEngine<SimBus>>();
    }

    #[test]
    fn init_failure_reports_the_failing_queue() {
        init_logging();
        let harness = Harness::new();
        let bus = Arc::new(SimBus::new(5));
        bus.set_tx_buffer_size(QueueId::Video.index(), 10);
        let err = PioEngine::init(bus, PioConfig::default(), harness.host.clone()).err();
        assert_eq!(
            err,
            Some(InitError::BufferSizeUnusable {
                queue: QueueId::Video,
                raw: 10
            })
        );
    }

    #[test]
    fn unknown_cookie_leaves_queues_untouched() {
        let harness = Harness::new();
        let (_bus, engine) = engine(PioConfig::default(), &harness);
        engine.submit(TxFrame::new(vec![0; 40], 2)).unwrap();
        let before = engine.queue(QueueId::BestEffort).snapshot();

        let err = engine.handle_tx_status(&TxStatus::new(0x6000, true));
        assert_eq!(err, Err(CompletionError::Cookie(CookieError::UnknownQueue(6))));
        assert_eq!(engine.queue(QueueId::BestEffort).snapshot(), before);
    }

    #[test]
    fn stats_follow_class_mapping() {
        let harness = Harness::new();
        let (_bus, engine) = engine(PioConfig::default(), &harness);
        engine.submit(TxFrame::new(vec![0; 40], 0)).unwrap();
        let stats = engine.tx_stats();
        assert_eq!(stats[0].len, 1);
        assert_eq!(stats[1].len, 0);
        assert_eq!(stats[0].limit, crate::tx::MAX_TX_SLOTS);
    }

    #[test]
    fn stopped_engine_ignores_rx_interrupts() {
        let harness = Harness::new();
        let (bus, engine) = engine(PioConfig::default(), &harness);
        engine.rx_interrupt();
        assert_eq!(harness.scheduler.scheduled(), 1);
        engine.stop();
        engine.rx_interrupt();
        bus.push_rx(vec![0; 24]);
        assert_eq!(engine.rx_work(), RxWork::Drained);
        assert_eq!(harness.scheduler.scheduled(), 1);
        assert_eq!(bus.pending_rx(), 1);
    }
}
