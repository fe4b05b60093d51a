//! LVDS output path: scaler or bypass, and the core PLL (bank A).

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use log::debug;
use proc_bitfield::bitfield;

use super::{Error, Result};
use super::config::ColorDepth;
use super::ratio::{scale_ratio, CorePllDivider, FixedPointRatio};
use super::regs::{wait, Reg, RegisterBus, Registers};
use super::timing::{LvdsTiming, TimingDescriptor};

/// The scaler output needs this long before the panel sees stable pixels.
pub const SCALER_SETTLE: Duration = Duration::from_millis(300);
pub const BYPASS_SETTLE: Duration = Duration::from_millis(100);

const SOFT_RESET: Reg = Reg::a(0x03);
const LVDS_PLL_RESET: Reg = Reg::a(0x02);
const CORE_PLL_RESET: Reg = Reg::a(0x04);
const CORE_PLL_INTEGER: Reg = Reg::a(0x69);
const FORMAT: Reg = Reg::a(0xa8);

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct LvdsFormat(pub u8): FromRaw, IntoRaw {
        pub jeida: bool @ 5,
        pub de_mode: bool @ 3,
    }
}

impl LvdsFormat {
    /// VESA bit mapping, sync mode.
    pub fn vesa_sync() -> LvdsFormat {
        let mut format = LvdsFormat(0);
        format.set_jeida(false);
        format.set_de_mode(false);
        format
    }

    pub fn with_depth(self, depth: ColorDepth) -> u8 {
        self.0 | depth.lvds_code()
    }
}

/// Scaler register fields, packed and range-checked up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalerPlan {
    pub input_hactive: u16,
    pub htotal: u16,
    pub hsync: u8,
    pub hbp: u16,
    pub vsync: u8,
    pub hactive: u16,
    pub vactive: u16,
    pub h_ratio: FixedPointRatio,
    pub v_ratio: FixedPointRatio,
}

impl ScalerPlan {
    pub fn new(input: &TimingDescriptor, panel: &LvdsTiming) -> Result<ScalerPlan> {
        panel.validate()?;
        if panel.h.sync_width > 0xff {
            return Err(Error::InvalidTiming("LVDS hsync wider than 255"))
        }
        if panel.h.back_porch >= 512 {
            return Err(Error::InvalidTiming("LVDS back porch does not fit 9 bits"))
        }
        if panel.v.sync_width >= 128 {
            return Err(Error::InvalidTiming("LVDS vsync does not fit 7 bits"))
        }
        if panel.h.active >= 4096 || panel.v.active >= 4096 {
            return Err(Error::InvalidTiming("LVDS active size does not fit 12 bits"))
        }
        Ok(ScalerPlan {
            input_hactive: input.hactive,
            htotal: panel.h.total() as u16,
            hsync: panel.h.sync_width as u8,
            hbp: panel.h.back_porch,
            vsync: panel.v.sync_width as u8,
            hactive: panel.h.active,
            vactive: panel.v.active,
            h_ratio: scale_ratio(input.hactive as u32, panel.h.active as u32)?,
            v_ratio: scale_ratio(input.vactive as u32, panel.v.active as u32)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPath {
    Scaler(ScalerPlan),
    Bypass,
}

impl OutputPath {
    pub fn write<B, D>(&self, regs: &mut Registers<B>, delay: &mut D,
                       depth: ColorDepth) -> Result<()>
        where B: RegisterBus, D: DelayNs
    {
        let format = LvdsFormat::vesa_sync().with_depth(depth);
        match self {
            &OutputPath::Scaler(ref plan) => write_scaler(regs, delay, plan, format),
            &OutputPath::Bypass => write_bypass(regs, delay, format),
        }
    }
}

fn write_scaler<B, D>(regs: &mut Registers<B>, delay: &mut D, plan: &ScalerPlan,
                      format: u8) -> Result<()>
    where B: RegisterBus, D: DelayNs
{
    debug!("scaler: {}x{} ratios 0x{:04x}/0x{:04x}",
           plan.hactive, plan.vactive, plan.h_ratio.0, plan.v_ratio.0);
    regs.write(Reg::a(0x80), 0x00)?;
    regs.write(Reg::a(0x81), 0xff)?;
    regs.write(Reg::a(0x82), 0x03)?;
    regs.write_pair(Reg::a(0x83), plan.input_hactive)?;
    regs.write(Reg::a(0x85), 0x80)?;
    regs.write(Reg::a(0x86), 0x10)?;
    regs.write_pair(Reg::a(0x87), plan.htotal)?;
    regs.write(Reg::a(0x89), plan.hsync)?;
    regs.write(Reg::a(0x8a), (plan.hbp & 0xff) as u8)?;
    regs.write(Reg::a(0x8b), ((plan.hbp >> 8) << 7) as u8 | plan.vsync)?;
    regs.write(Reg::a(0x8c), (plan.hactive & 0xff) as u8)?;
    regs.write(Reg::a(0x8d), (plan.vactive & 0xff) as u8)?;
    regs.write(Reg::a(0x8e), (((plan.vactive >> 8) << 4) | (plan.hactive >> 8)) as u8)?;
    regs.write(Reg::a(0x8f), plan.h_ratio.low())?;
    regs.write(Reg::a(0x90), plan.h_ratio.high())?;
    regs.write(Reg::a(0x91), plan.v_ratio.low())?;
    regs.write(Reg::a(0x92), plan.v_ratio.high())?;
    regs.write(Reg::a(0x7f), 0x9c)?;
    regs.write(FORMAT, format)?;
    regs.write(Reg::a(0x44), 0x30)?;        // LVDS output enable
    wait(delay, SCALER_SETTLE);
    Ok(())
}

fn write_bypass<B, D>(regs: &mut Registers<B>, delay: &mut D, format: u8) -> Result<()>
    where B: RegisterBus, D: DelayNs
{
    let now = Duration::from_millis(0);
    debug!("scaler bypassed");
    regs.write(Reg::a(0x50), 0x24)?;
    regs.write(Reg::a(0x51), 0x2d)?;
    regs.write(Reg::a(0x52), 0x04)?;
    regs.pulse_bit(delay, CORE_PLL_INTEGER, 0x0e, 0x80, now)?;
    regs.write(Reg::a(0x6a), 0x00)?;
    regs.write(Reg::a(0x6c), 0xb8)?;
    regs.write(Reg::a(0x6b), 0x51)?;
    regs.pulse_bit(delay, CORE_PLL_RESET, 0xff, 0x04, now)?;
    regs.write(Reg::a(0x7f), 0x00)?;
    regs.write(FORMAT, format)?;
    wait(delay, BYPASS_SETTLE);
    regs.pulse_bit(delay, LVDS_PLL_RESET, 0xff, 0x08, now)?;
    regs.pulse_bit(delay, SOFT_RESET, 0xff, 0x30, now)?;      // scaler
    regs.pulse_bit(delay, SOFT_RESET, 0xff, 0x04, now)?;      // LVDS TX
    Ok(())
}

/// Programs the LVDS core PLL for the panel clock and resets it.
pub fn write_core_pll<B, D>(regs: &mut Registers<B>, delay: &mut D,
                            divider: &CorePllDivider) -> Result<()>
    where B: RegisterBus, D: DelayNs
{
    let now = Duration::from_millis(0);
    debug!("core PLL: {} + 0x{:02x}{:02x}", divider.integer, divider.frac_high, divider.frac_low);
    regs.write(Reg::a(0x50), 0x24)?;
    regs.write(Reg::a(0x51), 0x05)?;
    regs.write(Reg::a(0x52), 0x14)?;
    regs.pulse_bit(delay, CORE_PLL_INTEGER, divider.integer, 0x80, now)?;
    regs.write(Reg::a(0x6c), divider.frac_high)?;
    regs.write(Reg::a(0x6b), divider.frac_low)?;
    regs.pulse_bit(delay, CORE_PLL_RESET, 0xff, 0x04, now)
}
