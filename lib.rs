//! Configuration engine for the Lontium LT8912 MIPI-DSI to LVDS/HDMI bridge.
//!
//! The chip exposes three 8-bit register banks (A, B and C) behind three
//! consecutive I2C addresses. Bringing it up is a strictly ordered sequence of
//! register writes, bit pulses and settle delays; the order matters because
//! several registers latch on write rather than on value.
//!
//! The caller supplies a [`TimingDescriptor`] (and for LVDS panels an
//! [`LvdsTiming`]) together with a [`BridgeConfig`], then drives the chip
//! through [`Bridge::wake`], [`Bridge::initialize`], [`Bridge::activate`] and
//! [`Bridge::sleep`].

#![no_std]

#[cfg(test)]
extern crate std;

use core::fmt;
use core::result;

pub mod regs;
pub mod ratio;
pub mod timing;
pub mod lvds;
pub mod hdmi;
pub mod config;
pub mod bridge;
pub mod hpd;

pub use bridge::{Bridge, BridgeState, Cancellation};
pub use config::{AudioMode, BridgeConfig, ColorDepth, ConfigSource, OutputMode};
pub use hpd::{HotplugDetector, LinkStatus};
pub use regs::{Bank, I2cBanks, Reg, RegisterBus, Registers};
pub use timing::{LvdsTiming, SyncPolarity, TimingDescriptor};

pub type Result<T> = result::Result<T, Error>;

/// Which transport boundary failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoFault {
    Bus { bank: Bank, addr: u8 },
    ResetLine,
    HotplugLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A register or GPIO access failed. Never retried: a repeated write in
    /// the middle of a sequence could pulse a reset bit twice.
    Io(IoFault),
    InvalidTiming(&'static str),
    UnsupportedConfiguration(&'static str),
    AlreadyOwned,
    InvalidState { state: BridgeState, operation: &'static str },
    Cancelled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Error::Io(IoFault::Bus { bank, addr }) =>
                write!(f, "bus write to bank {:?} register 0x{:02x} failed", bank, addr),
            &Error::Io(IoFault::ResetLine) =>
                write!(f, "reset line could not be driven"),
            &Error::Io(IoFault::HotplugLine) =>
                write!(f, "hot-plug line could not be read"),
            &Error::InvalidTiming(reason) =>
                write!(f, "invalid timing: {}", reason),
            &Error::UnsupportedConfiguration(reason) =>
                write!(f, "unsupported configuration: {}", reason),
            &Error::AlreadyOwned =>
                write!(f, "bridge chip is already owned by another instance"),
            &Error::InvalidState { state, operation } =>
                write!(f, "cannot {} while in state {:?}", operation, state),
            &Error::Cancelled =>
                write!(f, "bring-up cancelled"),
        }
    }
}
