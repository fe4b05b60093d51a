//! Fixed-point clock and scaling ratios.
//!
//! The chip takes its ratios as scaled integers. All arithmetic here is done
//! in integers with the same rounding the vendor reference code uses, so the
//! register values match bit for bit.

use super::{Error, Result};

/// Unity for the scaler ratio registers (x/4096).
pub const SCALE_UNITY: u32 = 4096;

const PRECISION: u64 = 100_000;

/// A 16-bit scaled ratio as it goes into two consecutive registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPointRatio(pub u32);

impl FixedPointRatio {
    pub fn low(&self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub fn high(&self) -> u8 {
        ((self.0 >> 8) & 0xff) as u8
    }
}

/// Scaler ratio mapping `active_in` input pixels (or lines) onto
/// `active_out` output pixels:
/// `round(100000 * (in - 1) / (out - 1) * 4096 / 100000)`, with the quotient
/// truncated before the multiply and rounded half-up at the end.
pub fn scale_ratio(active_in: u32, active_out: u32) -> Result<FixedPointRatio> {
    if active_in <= 1 {
        return Err(Error::InvalidTiming("scaler input active size must exceed 1"))
    }
    if active_out <= 1 {
        return Err(Error::InvalidTiming("scaler output active size must exceed 1"))
    }
    let quotient = PRECISION * (active_in as u64 - 1) / (active_out as u64 - 1);
    let ratio = (quotient * SCALE_UNITY as u64 + PRECISION / 2) / PRECISION;
    if ratio > 0xffff {
        return Err(Error::InvalidTiming("scaler ratio does not fit 16 bits"))
    }
    Ok(FixedPointRatio(ratio as u32))
}

/// LVDS core PLL divider derived from the LVDS pixel clock.
///
/// The clock is first brought into register units with the 7/25 factor.
/// The integer part goes into 0x69 (bit 7 of that register is the load
/// strobe, so the integer must stay below 0x80); the fractional part is
/// scaled by 16384 and split across 0x6c (biased by 128) and 0x6b.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorePllDivider {
    pub integer: u8,
    pub frac_high: u8,
    pub frac_low: u8,
}

impl CorePllDivider {
    pub fn from_clock_khz(clock_khz: u32) -> Result<CorePllDivider> {
        if clock_khz == 0 {
            return Err(Error::InvalidTiming("LVDS pixel clock must be non-zero"))
        }
        let units = clock_khz as u64 * 7 / 25;
        let integer = units / 1000;
        if integer >= 0x80 {
            return Err(Error::InvalidTiming("LVDS pixel clock too high for the core PLL"))
        }
        let frac = (units % 1000) * 16384 / 1000;
        Ok(CorePllDivider {
            integer: integer as u8,
            frac_high: (frac / 256 + 128) as u8,
            frac_low: (frac % 256) as u8,
        })
    }
}
