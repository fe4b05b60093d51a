//! Hot-plug detection on the HDMI side.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use log::{debug, error};

use super::{Error, IoFault, Result};
use super::config::OutputMode;
use super::regs::wait;

pub const POLL_INTERVAL: Duration = Duration::from_millis(20);
pub const DEBOUNCE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
    Unknown,
}

impl From<bool> for LinkStatus {
    fn from(high: bool) -> LinkStatus {
        if high { LinkStatus::Connected } else { LinkStatus::Disconnected }
    }
}

/// Owns the HPD input only, so it can be polled from a different context than
/// the one configuring the bridge.
pub struct HotplugDetector<P, D> {
    pin: P,
    delay: D,
    output_mode: OutputMode,
    status: LinkStatus,
}

impl<P: InputPin, D: DelayNs> HotplugDetector<P, D> {
    pub fn new(pin: P, delay: D, output_mode: OutputMode) -> Self {
        HotplugDetector { pin, delay, output_mode, status: LinkStatus::Unknown }
    }

    /// Result of the last [`detect`](Self::detect).
    pub fn status(&self) -> LinkStatus {
        self.status
    }

    fn sample(&mut self) -> Result<bool> {
        self.pin.is_high().map_err(|_| {
            error!("failed to read the hot-plug line");
            Error::Io(IoFault::HotplugLine)
        })
    }

    /// Samples until two consecutive reads agree. If the line keeps toggling
    /// past the timeout, the last sample wins.
    pub fn detect(&mut self) -> Result<LinkStatus> {
        if self.output_mode == OutputMode::Lvds {
            self.status = LinkStatus::Connected;
            return Ok(self.status)
        }

        let mut previous = self.sample()?;
        let mut elapsed = Duration::from_millis(0);
        let level = loop {
            wait(&mut self.delay, POLL_INTERVAL);
            elapsed += POLL_INTERVAL;
            let current = self.sample()?;
            if current == previous {
                break current
            }
            if elapsed >= DEBOUNCE_TIMEOUT {
                debug!("hot-plug line unstable after {:?}", elapsed);
                break current
            }
            previous = current;
        };
        self.status = LinkStatus::from(level);
        debug!("link {:?}", self.status);
        Ok(self.status)
    }

    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }
}
