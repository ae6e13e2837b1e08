// Author: Lukas Bower
// Purpose: Recording collaborators shared by the crate's unit tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::cookie::Cookie;
use crate::error::HeaderError;
use crate::frame::{RxFrame, TxFrame, TxReport};
use crate::header::{self, TxHeaderBuf};
use crate::mac::{FlowControl, Host, MacLayer, RxScheduler};

#[derive(Default)]
pub struct RecordingMac {
    pub delivered: Mutex<Vec<RxFrame>>,
    pub reports: Mutex<Vec<(Vec<u8>, TxReport)>>,
    pub announced: Mutex<Vec<Cookie>>,
    pub awake: Mutex<Vec<bool>>,
    pub missing_key: Mutex<bool>,
}

impl MacLayer for RecordingMac {
    fn deliver_frame(&self, frame: RxFrame) {
        self.delivered.lock().unwrap().push(frame);
    }

    fn report_tx_outcome(&self, frame: TxFrame, report: &TxReport) {
        self.reports
            .lock()
            .unwrap()
            .push((frame.into_data(), *report));
    }

    fn build_tx_header(
        &self,
        frame: &TxFrame,
        cookie: Cookie,
        out: &mut TxHeaderBuf,
    ) -> Result<(), HeaderError> {
        if *self.missing_key.lock().unwrap() {
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
pub struct RecordingFlow {
    pub events: Mutex<Vec<(bool, u8)>>,
}

impl FlowControl for RecordingFlow {
    fn queue_stopped(&self, class: u8) {
        self.events.lock().unwrap().push((false, class));
    }

    fn queue_resumed(&self, class: u8) {
        self.events.lock().unwrap().push((true, class));
    }
}

#[derive(Default)]
pub struct CountingScheduler {
    pub scheduled: AtomicUsize,
    pub yields: AtomicUsize,
}

impl CountingScheduler {
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }
}

impl RxScheduler for CountingScheduler {
    fn schedule_rx(&self) {
        self.scheduled.fetch_add(1, Ordering::SeqCst);
    }

    fn yield_now(&self) {
        self.yields.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub mac: Arc<RecordingMac>,
    pub flow: Arc<RecordingFlow>,
    pub scheduler: Arc<CountingScheduler>,
    pub host: Host,
}

impl Harness {
    pub fn new() -> Self {
        let mac = Arc::new(RecordingMac::default());
        let flow = Arc::new(RecordingFlow::default());
        let scheduler = Arc::new(CountingScheduler::default());
        let host = Host::new(mac.clone(), flow.clone(), scheduler.clone());
        Self {
            mac,
            flow,
            scheduler,
            host,
        }
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
