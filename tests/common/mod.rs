//! Recording mock collaborators.
//!
//! Every pin, bus and delay call lands in one ordered event log shared by all
//! handles, so tests can check ordering across lines and the bus.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use cog_sequencer::{BusConfig, CancelToken, IoProvider, PinMap};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorType, InputPin, OutputPin};
use embedded_hal::spi::{self, Mode, Operation, SpiDevice};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Open { pin: u8, output: bool },
    Set { pin: u8, high: bool },
    Read { pin: u8, high: bool },
    Release { pin: u8 },
    BusOpen {
        bus: String,
        chip_select: u8,
        clock_hz: u32,
        mode: Mode,
    },
    BusWrite(Vec<u8>),
    BusTransfer { write: Vec<u8>, read: Vec<u8> },
    BusClose,
    Delay(u32),
}

#[derive(Default)]
struct Inner {
    events: Vec<Event>,
    in_use: HashSet<u8>,
    busy_high_reads: u32,
    fail_open: Option<u8>,
    fail_set: Option<u8>,
    fail_bus_open: bool,
    fail_read: bool,
    id_response: [u8; 2],
    cancel_after_delays: Option<(usize, CancelToken)>,
}

/// Shared view on the event log and failure switches.
#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<Inner>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().events.clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().events.clear();
    }

    pub fn total_delay_ms(&self) -> u32 {
        self.events()
            .iter()
            .map(|e| match e {
                Event::Delay(ms) => *ms,
                _ => 0,
            })
            .sum()
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    /// Busy line reads high this many times before going low.
    pub fn busy_for(&self, reads: u32) {
        self.0.borrow_mut().busy_high_reads = reads;
    }

    pub fn fail_open(&self, pin: u8) {
        self.0.borrow_mut().fail_open = Some(pin);
    }

    pub fn fail_set(&self, pin: u8) {
        self.0.borrow_mut().fail_set = Some(pin);
    }

    /// Every busy line read errors out.
    pub fn fail_read(&self) {
        self.0.borrow_mut().fail_read = true;
    }

    pub fn fail_bus_open(&self) {
        self.0.borrow_mut().fail_bus_open = true;
    }

    pub fn id_response(&self, raw: [u8; 2]) {
        self.0.borrow_mut().id_response = raw;
    }

    /// Fire `token` once this many delays have completed.
    pub fn cancel_after_delays(&self, delays: usize, token: CancelToken) {
        self.0.borrow_mut().cancel_after_delays = Some((delays, token));
    }

    fn push(&self, event: Event) {
        self.0.borrow_mut().events.push(event);
    }

    fn release(&self, pin: u8) {
        let mut inner = self.0.borrow_mut();
        inner.in_use.remove(&pin);
        inner.events.push(Event::Release { pin });
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MockError {
    #[error("pin {0} is already in use")]
    InUse(u8),
    #[error("pin {0} refused to open")]
    Refused(u8),
    #[error("bus refused to open")]
    BusRefused,
}

#[derive(Debug)]
pub struct MockPinError;

impl digital::Error for MockPinError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

#[derive(Debug)]
pub struct MockBusError;

impl spi::Error for MockBusError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

pub struct MockOutput {
    pin: u8,
    rec: Recorder,
}

impl ErrorType for MockOutput {
    type Error = MockPinError;
}

impl MockOutput {
    fn set(&mut self, high: bool) -> Result<(), MockPinError> {
        if self.rec.0.borrow().fail_set == Some(self.pin) {
            return Err(MockPinError);
        }
        self.rec.push(Event::Set {
            pin: self.pin,
            high,
        });
        Ok(())
    }
}

impl OutputPin for MockOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true)
    }
}

impl Drop for MockOutput {
    fn drop(&mut self) {
        self.rec.release(self.pin);
    }
}

pub struct MockInput {
    pin: u8,
    rec: Recorder,
}

impl ErrorType for MockInput {
    type Error = MockPinError;
}

impl InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let high = {
            let mut inner = self.rec.0.borrow_mut();
            if inner.fail_read {
                return Err(MockPinError);
            }
            if inner.busy_high_reads > 0 {
                inner.busy_high_reads -= 1;
                true
            } else {
                false
            }
        };
        self.rec.push(Event::Read {
            pin: self.pin,
            high,
        });
        Ok(high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

impl Drop for MockInput {
    fn drop(&mut self) {
        self.rec.release(self.pin);
    }
}

pub struct MockBus {
    claimed: [u8; 3],
    rec: Recorder,
}

impl spi::ErrorType for MockBus {
    type Error = MockBusError;
}

impl SpiDevice for MockBus {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        for op in operations {
            match op {
                Operation::Write(bytes) => self.rec.push(Event::BusWrite(bytes.to_vec())),
                Operation::Transfer(read, write) => {
                    let response = self.rec.0.borrow().id_response;
                    for (slot, byte) in read.iter_mut().zip(response.iter()) {
                        *slot = *byte;
                    }
                    self.rec.push(Event::BusTransfer {
                        write: write.to_vec(),
                        read: read.to_vec(),
                    });
                }
                _ => return Err(MockBusError),
            }
        }
        Ok(())
    }
}

impl Drop for MockBus {
    fn drop(&mut self) {
        let mut inner = self.rec.0.borrow_mut();
        for pin in self.claimed {
            inner.in_use.remove(&pin);
        }
        inner.events.push(Event::BusClose);
    }
}

/// Provider enforcing exclusive ownership of pin numbers, with the bus
/// claiming its clock, data and chip select lines while open.
pub struct MockProvider {
    rec: Recorder,
    bus_pins: [u8; 3],
}

impl MockProvider {
    pub fn new(rec: &Recorder, pins: &PinMap) -> Self {
        MockProvider {
            rec: rec.clone(),
            bus_pins: [pins.clock, pins.data, pins.chip_select],
        }
    }

    fn claim(&mut self, pin: u8, output: bool) -> Result<(), MockError> {
        let mut inner = self.rec.0.borrow_mut();
        if inner.fail_open == Some(pin) {
            return Err(MockError::Refused(pin));
        }
        if !inner.in_use.insert(pin) {
            return Err(MockError::InUse(pin));
        }
        inner.events.push(Event::Open { pin, output });
        Ok(())
    }
}

impl IoProvider for MockProvider {
    type Error = MockError;
    type Output = MockOutput;
    type Input = MockInput;
    type Bus = MockBus;

    fn name(&self) -> &str {
        "mock"
    }

    fn open_output(&mut self, pin: u8) -> Result<MockOutput, MockError> {
        self.claim(pin, true)?;
        Ok(MockOutput {
            pin,
            rec: self.rec.clone(),
        })
    }

    fn open_input(&mut self, pin: u8) -> Result<MockInput, MockError> {
        self.claim(pin, false)?;
        Ok(MockInput {
            pin,
            rec: self.rec.clone(),
        })
    }

    fn open_bus(&mut self, config: &BusConfig) -> Result<MockBus, MockError> {
        let mut inner = self.rec.0.borrow_mut();
        if inner.fail_bus_open {
            return Err(MockError::BusRefused);
        }
        if let Some(pin) = self.bus_pins.iter().find(|p| inner.in_use.contains(*p)) {
            return Err(MockError::InUse(*pin));
        }
        inner.in_use.extend(self.bus_pins);
        inner.events.push(Event::BusOpen {
            bus: config.bus.clone(),
            chip_select: config.chip_select,
            clock_hz: config.clock_hz,
            mode: config.mode,
        });
        Ok(MockBus {
            claimed: self.bus_pins,
            rec: self.rec.clone(),
        })
    }
}

pub struct MockDelay {
    rec: Recorder,
}

impl MockDelay {
    pub fn new(rec: &Recorder) -> Self {
        MockDelay { rec: rec.clone() }
    }

    fn record(&mut self, ms: u32) {
        self.rec.push(Event::Delay(ms));
        let inner = self.rec.0.borrow();
        if let Some((after, token)) = &inner.cancel_after_delays {
            let done = inner
                .events
                .iter()
                .filter(|e| matches!(e, Event::Delay(_)))
                .count();
            if done >= *after {
                token.cancel();
            }
        }
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.record(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(ms);
    }
}

pub type MockSequencer = cog_sequencer::Sequencer<MockProvider, MockDelay>;

pub fn sequencer(rec: &Recorder, config: cog_sequencer::SequencerConfig) -> MockSequencer {
    let provider = MockProvider::new(rec, &config.pins);
    cog_sequencer::Sequencer::new(provider, MockDelay::new(rec), config)
}

pub fn default_sequencer(rec: &Recorder) -> MockSequencer {
    sequencer(rec, cog_sequencer::SequencerConfig::default())
}

pub fn set(pin: u8, high: bool) -> Event {
    Event::Set { pin, high }
}
