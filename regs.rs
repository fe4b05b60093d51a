//! Register bank access.
//!
//! The LT8912 answers on three consecutive I2C addresses, one per bank.
//! Nothing is ever read back from the chip: every field is computed before
//! the write is issued, and [`Registers`] keeps a mirror of what was written.

use core::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use log::{error, trace};

use super::{Error, IoFault, Result};

/// 7-bit address of bank A; banks B and C follow at +1 and +2.
pub const DEFAULT_ADDRESS: u8 = 0x48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    /// Analog, clocking, LVDS output and scaler.
    A = 0,
    /// MIPI receiver digital timing and DDS.
    B = 1,
    /// HDMI packets and audio.
    C = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg {
    pub bank: Bank,
    pub addr: u8,
}

impl Reg {
    pub const fn a(addr: u8) -> Reg { Reg { bank: Bank::A, addr } }
    pub const fn b(addr: u8) -> Reg { Reg { bank: Bank::B, addr } }
    pub const fn c(addr: u8) -> Reg { Reg { bank: Bank::C, addr } }
}

/// Transport to the three register banks. Writes must reach the chip in
/// the order they are issued.
pub trait RegisterBus {
    /// Bus address of bank A. Identifies the physical chip.
    fn address(&self) -> u8;

    fn write(&mut self, bank: Bank, addr: u8, value: u8) -> Result<()>;
}

/// Highest bank A address that still leaves banks B and C in 7-bit range.
pub const MAX_ADDRESS: u8 = 0x7f - Bank::C as u8;

pub fn check_address(address: u8) -> Result<()> {
    if address > MAX_ADDRESS {
        return Err(Error::UnsupportedConfiguration(
            "bank A address must leave room for banks B and C"))
    }
    Ok(())
}

pub struct I2cBanks<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> I2cBanks<I2C> {
    pub fn new(i2c: I2C) -> Self {
        I2cBanks { i2c, address: DEFAULT_ADDRESS }
    }

    pub fn with_address(i2c: I2C, address: u8) -> Result<Self> {
        check_address(address)?;
        Ok(I2cBanks { i2c, address })
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> RegisterBus for I2cBanks<I2C> {
    fn address(&self) -> u8 {
        self.address
    }

    fn write(&mut self, bank: Bank, addr: u8, value: u8) -> Result<()> {
        let device = self.address + bank as u8;
        self.i2c.write(device, &[addr, value]).map_err(|err| {
            error!("LT8912 bank {:?} (0x{:02x}) failed to ack register 0x{:02x}: {:?}",
                   bank, device, addr, err.kind());
            Error::Io(IoFault::Bus { bank, addr })
        })
    }
}

/// Blocks for `duration`; zero is a no-op.
pub fn wait<D: DelayNs>(delay: &mut D, duration: Duration) {
    let ms = duration.as_millis() as u32;
    if ms > 0 {
        delay.delay_ms(ms)
    }
}

pub struct Registers<B> {
    bus: B,
    mirror: [[Option<u8>; 256]; 3],
    writes: usize,
}

impl<B: RegisterBus> Registers<B> {
    pub fn new(bus: B) -> Self {
        Registers {
            bus,
            mirror: [[None; 256]; 3],
            writes: 0,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    pub fn write(&mut self, reg: Reg, value: u8) -> Result<()> {
        trace!("[{:?}:0x{:02x}] <- 0x{:02x}", reg.bank, reg.addr, value);
        self.bus.write(reg.bank, reg.addr, value)?;
        self.mirror[reg.bank as usize][reg.addr as usize] = Some(value);
        self.writes += 1;
        Ok(())
    }

    /// Writes a 16-bit field as low byte at `low`, high byte at the next
    /// address.
    pub fn write_pair(&mut self, low: Reg, value: u16) -> Result<()> {
        let mut bytes = [0; 2];
        LittleEndian::write_u16(&mut bytes, value);
        self.write(low, bytes[0])?;
        self.write(Reg { bank: low.bank, addr: low.addr + 1 }, bytes[1])
    }

    /// Issues a fixed `(address, value)` template in order.
    pub fn write_table(&mut self, bank: Bank, table: &[(u8, u8)]) -> Result<()> {
        for &(addr, value) in table.iter() {
            self.write(Reg { bank, addr }, value)?;
        }
        Ok(())
    }

    /// Writes `value` with `mask` cleared, waits `settle`, then writes it with
    /// `mask` set. Used for the active-low reset and latch bits.
    pub fn pulse_bit<D: DelayNs>(&mut self, delay: &mut D, reg: Reg, value: u8, mask: u8,
                                 settle: Duration) -> Result<()> {
        self.write(reg, value & !mask)?;
        wait(delay, settle);
        self.write(reg, value | mask)
    }

    /// Inverse of [`pulse_bit`](Self::pulse_bit): set, wait, clear.
    pub fn strobe_bit<D: DelayNs>(&mut self, delay: &mut D, reg: Reg, value: u8, mask: u8,
                                  settle: Duration) -> Result<()> {
        self.write(reg, value | mask)?;
        wait(delay, settle);
        self.write(reg, value & !mask)
    }

    /// Last value written to `reg` by this instance.
    pub fn mirror(&self, reg: Reg) -> Option<u8> {
        self.mirror[reg.bank as usize][reg.addr as usize]
    }

    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Forgets the mirror; the chip loses its state on a hardware reset.
    pub fn clear_mirror(&mut self) {
        self.mirror = [[None; 256]; 3];
    }
}
