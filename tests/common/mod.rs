#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU8, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};
use lt8912::{Bank, Error, IoFault, RegisterBus, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Write(Bank, u8, u8),
    /// `true` when RESET_N is driven low.
    Reset(bool),
    Delay(u32),
}

pub type Log = Rc<RefCell<Vec<Event>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Each test needs its own chip address: claims are process-wide.
pub fn next_address() -> u8 {
    static NEXT: AtomicU8 = AtomicU8::new(0x08);
    NEXT.fetch_add(1, Ordering::SeqCst)
}

pub struct Bus {
    pub log: Log,
    pub address: u8,
    pub fail_at: Rc<RefCell<Option<(Bank, u8)>>>,
}

impl Bus {
    pub fn new(log: &Log) -> Bus {
        Bus { log: log.clone(), address: next_address(), fail_at: Rc::new(RefCell::new(None)) }
    }
}

impl RegisterBus for Bus {
    fn address(&self) -> u8 {
        self.address
    }

    fn write(&mut self, bank: Bank, addr: u8, value: u8) -> Result<()> {
        if *self.fail_at.borrow() == Some((bank, addr)) {
            return Err(Error::Io(IoFault::Bus { bank, addr }))
        }
        self.log.borrow_mut().push(Event::Write(bank, addr, value));
        Ok(())
    }
}

pub struct ResetPin {
    pub log: Log,
    pub broken: bool,
}

impl ResetPin {
    pub fn new(log: &Log) -> ResetPin {
        ResetPin { log: log.clone(), broken: false }
    }

    fn drive(&mut self, asserted: bool) -> std::result::Result<(), ErrorKind> {
        if self.broken {
            return Err(ErrorKind::Other)
        }
        self.log.borrow_mut().push(Event::Reset(asserted));
        Ok(())
    }
}

impl ErrorType for ResetPin {
    type Error = ErrorKind;
}

impl OutputPin for ResetPin {
    fn set_low(&mut self) -> std::result::Result<(), ErrorKind> {
        self.drive(true)
    }

    fn set_high(&mut self) -> std::result::Result<(), ErrorKind> {
        self.drive(false)
    }
}

pub struct Delay {
    pub log: Log,
}

impl Delay {
    pub fn new(log: &Log) -> Delay {
        Delay { log: log.clone() }
    }
}

impl DelayNs for Delay {
    fn delay_ns(&mut self, ns: u32) {
        self.log.borrow_mut().push(Event::Delay(ns / 1_000_000))
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.borrow_mut().push(Event::Delay(ms))
    }
}

/// Replays a fixed sequence of levels, repeating the last one.
pub struct HotplugPin {
    pub levels: Vec<bool>,
    pub reads: usize,
}

impl HotplugPin {
    pub fn new(levels: &[bool]) -> HotplugPin {
        HotplugPin { levels: levels.to_vec(), reads: 0 }
    }
}

impl ErrorType for HotplugPin {
    type Error = ErrorKind;
}

impl InputPin for HotplugPin {
    fn is_high(&mut self) -> std::result::Result<bool, ErrorKind> {
        let level = self.levels[self.reads.min(self.levels.len() - 1)];
        self.reads += 1;
        Ok(level)
    }

    fn is_low(&mut self) -> std::result::Result<bool, ErrorKind> {
        self.is_high().map(|high| !high)
    }
}

pub fn writes(log: &Log) -> Vec<(Bank, u8, u8)> {
    log.borrow().iter().filter_map(|event| match event {
        &Event::Write(bank, addr, value) => Some((bank, addr, value)),
        _ => None,
    }).collect()
}

/// Index of the first occurrence of `event` at or after `from`.
pub fn find(log: &Log, from: usize, event: Event) -> usize {
    log.borrow()[from..].iter().position(|e| *e == event)
        .map(|index| index + from)
        .unwrap_or_else(|| panic!("{:?} not found after {}", event, from))
}
