//! Mock hardware and platform adapters for integration tests.
//!
//! Every mock hands out a cloneable probe so tests can script inputs and
//! assert on outputs after the driver has taken ownership of the mock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use irnode::app::events::AppEvent;
use irnode::app::ports::{
    ClockPort, EventSink, ImageStream, ImageWriter, Qos, TelemetryPort, UpdatePlatform,
};
use irnode::error::CommsError;
use irnode::ota::UpdateError;

// ── Presence sensor input ─────────────────────────────────────

/// Active-low beam input. Each queued `true` reads as "object present";
/// an empty script reads as clear.
#[derive(Clone, Default)]
pub struct MockBeam {
    script: Arc<Mutex<VecDeque<bool>>>,
}

#[allow(dead_code)]
impl MockBeam {
    pub fn push(&self, present: bool) {
        self.script.lock().unwrap().push_back(present);
    }

    pub fn push_all(&self, samples: &[bool]) {
        self.script.lock().unwrap().extend(samples.iter().copied());
    }

    fn next_present(&self) -> bool {
        self.script.lock().unwrap().pop_front().unwrap_or(false)
    }
}

impl ErrorType for MockBeam {
    type Error = Infallible;
}

impl InputPin for MockBeam {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.next_present())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.next_present())
    }
}

// ── LED output ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct LedLog {
    pub high: bool,
    pub writes: u32,
}

#[derive(Clone, Default)]
pub struct MockLed {
    log: Arc<Mutex<LedLog>>,
}

#[allow(dead_code)]
impl MockLed {
    pub fn is_high(&self) -> bool {
        self.log.lock().unwrap().high
    }

    pub fn writes(&self) -> u32 {
        self.log.lock().unwrap().writes
    }
}

impl ErrorType for MockLed {
    type Error = Infallible;
}

impl OutputPin for MockLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut log = self.log.lock().unwrap();
        log.high = false;
        log.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut log = self.log.lock().unwrap();
        log.high = true;
        log.writes += 1;
        Ok(())
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub qos: Qos,
    pub retain: bool,
}

#[derive(Clone, Default)]
pub struct MockBroker {
    sent: Arc<Mutex<Vec<Published>>>,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn sent(&self) -> Vec<Published> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_payload(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|p| p.payload.clone())
    }
}

impl TelemetryPort for MockBroker {
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> Result<(), CommsError> {
        self.sent.lock().unwrap().push(Published {
            topic: topic.to_owned(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            qos,
            retain,
        });
        Ok(())
    }
}

// ── Clock + events ────────────────────────────────────────────

pub struct FixedClock(pub u64);

impl ClockPort for FixedClock {
    fn unix_secs(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Firmware platform ─────────────────────────────────────────

/// Outcome of opening the firmware URL.
#[derive(Clone)]
pub enum Server {
    Serves(Vec<u8>),
    Fails(UpdateError),
}

/// Scriptable update platform. When `held`, `open_image` blocks until
/// [`MockPlatform::release`] is called, keeping a job in `Downloading`.
/// Read and write faults are injected with the `failing_*` builders.
#[derive(Clone)]
pub struct MockPlatform {
    server: Server,
    gate: Arc<(Mutex<bool>, Condvar)>,
    read_fault: Option<(usize, UpdateError)>,
    write_fault: Option<UpdateError>,
    pub opens: Arc<AtomicU32>,
    pub restarts: Arc<AtomicU32>,
    pub finalized: Arc<AtomicU32>,
    pub flashed: Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl MockPlatform {
    pub fn new(server: Server) -> Self {
        Self {
            server,
            gate: Arc::new((Mutex::new(true), Condvar::new())),
            read_fault: None,
            write_fault: None,
            opens: Arc::default(),
            restarts: Arc::default(),
            finalized: Arc::default(),
            flashed: Arc::default(),
        }
    }

    pub fn held(server: Server) -> Self {
        let p = Self::new(server);
        p.hold();
        p
    }

    /// The stream delivers `after` bytes, then every read fails with `error`.
    pub fn failing_read_after(mut self, after: usize, error: UpdateError) -> Self {
        self.read_fault = Some((after, error));
        self
    }

    /// Every slot write fails with `error`.
    pub fn failing_write(mut self, error: UpdateError) -> Self {
        self.write_fault = Some(error);
        self
    }

    /// Make the next `open_image` block until [`release`](Self::release).
    pub fn hold(&self) {
        *self.gate.0.lock().unwrap() = false;
    }

    pub fn release(&self) {
        let (open, cv) = &*self.gate;
        *open.lock().unwrap() = true;
        cv.notify_all();
    }

    /// Block until a job has reached `open_image`.
    pub fn wait_for_open(&self) {
        self.wait_for_opens(1);
    }

    /// Block until `n` jobs in total have reached `open_image`.
    pub fn wait_for_opens(&self, n: u32) {
        for _ in 0..500 {
            if self.opens.load(Ordering::SeqCst) >= n {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("update job never opened the image");
    }

    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn finalized(&self) -> u32 {
        self.finalized.load(Ordering::SeqCst)
    }
}

pub struct MockStream {
    data: Vec<u8>,
    pos: usize,
    fault: Option<(usize, UpdateError)>,
}

impl ImageStream for MockStream {
    fn content_length(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, UpdateError> {
        let mut end = self.data.len();
        if let Some((after, error)) = self.fault {
            if self.pos >= after {
                return Err(error);
            }
            end = end.min(after);
        }
        let n = buf.len().min(end - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

pub struct MockSlot {
    flashed: Arc<Mutex<Vec<u8>>>,
    finalized: Arc<AtomicU32>,
    fault: Option<UpdateError>,
}

impl ImageWriter for MockSlot {
    fn write(&mut self, chunk: &[u8]) -> Result<(), UpdateError> {
        if let Some(error) = self.fault {
            return Err(error);
        }
        self.flashed.lock().unwrap().extend_from_slice(chunk);
        Ok(())
    }

    fn finalize(self) -> Result<(), UpdateError> {
        self.finalized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl UpdatePlatform for MockPlatform {
    type Stream = MockStream;
    type Writer = MockSlot;

    fn open_image(&self, _url: &str, _timeout: Duration) -> Result<MockStream, UpdateError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let (open, cv) = &*self.gate;
        let _open = cv.wait_while(open.lock().unwrap(), |open| !*open).unwrap();
        match &self.server {
            Server::Serves(data) => Ok(MockStream {
                data: data.clone(),
                pos: 0,
                fault: self.read_fault,
            }),
            Server::Fails(e) => Err(*e),
        }
    }

    fn begin_write(&self) -> Result<MockSlot, UpdateError> {
        Ok(MockSlot {
            flashed: Arc::clone(&self.flashed),
            finalized: Arc::clone(&self.finalized),
            fault: self.write_fault,
        })
    }

    fn restart(&self) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
    }
}

/// A well-formed image body of `len` bytes.
#[allow(dead_code)]
pub fn app_image(len: usize) -> Vec<u8> {
    let mut v: Vec<u8> = (0..len).map(|i| i as u8).collect();
    v[0] = irnode::ota::image::ESP_IMAGE_MAGIC;
    v
}
