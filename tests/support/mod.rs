// Author: Lukas Bower
// Purpose: Provide recording collaborators and helpers for the engine integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wlan_pio::hal::sim::SimBus;
use wlan_pio::header::{self, RxHeader, RxMacStatus, TxHeaderBuf, BASIC_TX_HEADER_LEN};
use wlan_pio::{
    Cookie, FlowControl, HeaderError, Host, MacLayer, PioConfig, PioEngine, RxFrame,
    RxScheduler, TxFrame, TxReport,
};

pub const HEADER_LEN: usize = BASIC_TX_HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Stopped(u8),
    Resumed(u8),
}

#[derive(Default)]
pub struct Mac {
    pub delivered: Mutex<Vec<RxFrame>>,
    pub reports: Mutex<Vec<(Vec<u8>, TxReport)>>,
    pub announced: Mutex<Vec<Cookie>>,
    pub awake: Mutex<Vec<bool>>,
    pub missing_key: AtomicBool,
}

impl Mac {
    pub fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    pub fn delivered_payloads(&self) -> Vec<Vec<u8>> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|frame| frame.payload().to_vec())
            .collect()
    }
}

impl MacLayer for Mac {
    fn deliver_frame(&self, frame: RxFrame) {
        self.delivered.lock().unwrap().push(frame);
    }

    fn report_tx_outcome(&self, frame: TxFrame, report: &TxReport) {
        self.reports.lock().unwrap().push((frame.into_data(), *report));
    }

    fn build_tx_header(
        &self,
        frame: &TxFrame,
        cookie: Cookie,
        out: &mut TxHeaderBuf,
    ) -> Result<(), HeaderError> {
        if self.missing_key.load(Ordering::SeqCst) {
            return Err(HeaderError::MissingKey);
        }
        header::build_basic_tx_header(frame, cookie, out)
    }

    fn announce_multicast_cookie(&self, cookie: Cookie) {
        self.announced.lock().unwrap().push(cookie);
    }

    fn set_awake(&self, awake: bool) {
        self.awake.lock().unwrap().push(awake);
    }
}

#[derive(Default)]
pub struct Upstream {
    pub events: Mutex<Vec<Flow>>,
}

impl Upstream {
    pub fn events(&self) -> Vec<Flow> {
        self.events.lock().unwrap().clone()
    }
}

impl FlowControl for Upstream {
    fn queue_stopped(&self, class: u8) {
        self.events.lock().unwrap().push(Flow::Stopped(class));
    }

    fn queue_resumed(&self, class: u8) {
        self.events.lock().unwrap().push(Flow::Resumed(class));
    }
}

#[derive(Default)]
pub struct Scheduler {
    pub scheduled: AtomicUsize,
}

impl Scheduler {
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }
}

impl RxScheduler for Scheduler {
    fn schedule_rx(&self) {
        self.scheduled.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Rig {
    pub bus: Arc<SimBus>,
    pub mac: Arc<Mac>,
    pub upstream: Arc<Upstream>,
    pub scheduler: Arc<Scheduler>,
    pub engine: PioEngine<SimBus>,
}

impl Rig {
    pub fn new(config: PioConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let bus = Arc::new(SimBus::new(config.revision));
        let mac = Arc::new(Mac::default());
        let upstream = Arc::new(Upstream::default());
        let scheduler = Arc::new(Scheduler::default());
        let host = Host::new(mac.clone(), upstream.clone(), scheduler.clone());
        let engine = PioEngine::init(bus.clone(), config, host).expect("engine init");
        Self {
            bus,
            mac,
            upstream,
            scheduler,
            engine,
        }
    }

    /// Cookie embedded in the most recent frame written to queue `index`.
    pub fn last_cookie(&self, index: usize) -> u16 {
        let frames = self.bus.tx_frames(index);
        let frame = frames.last().expect("no frame written");
        u16::from_le_bytes([frame[2], frame[3]])
    }
}

pub fn rx_bytes(len: u16, status: RxMacStatus, payload: &[u8]) -> Vec<u8> {
    let mut bytes = RxHeader::new(len, status).to_bytes().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

pub const fn wire(len: usize) -> u32 {
    ((HEADER_LEN + len + 3) & !3) as u32
}
