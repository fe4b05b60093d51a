//! Display timings and their mapping onto the MIPI receiver (bank B).

use log::debug;

use super::{Error, Result};
use super::regs::{Reg, RegisterBus, Registers};

/// Highest pixel clock the bridge accepts on the DSI side.
pub const MAX_PIXEL_CLOCK_KHZ: u32 = 150_000;
pub const MAX_HACTIVE: u16 = 1920;
pub const MAX_VACTIVE: u16 = 1080;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncPolarity {
    pub hsync_high: bool,
    pub vsync_high: bool,
}

/// One axis of a video mode split into its four intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blanking {
    pub active: u16,
    pub front_porch: u16,
    pub sync_width: u16,
    pub back_porch: u16,
}

impl Blanking {
    pub fn total(&self) -> u32 {
        self.active as u32 + self.front_porch as u32
            + self.sync_width as u32 + self.back_porch as u32
    }
}

/// DSI-side video mode, in the sync-start/sync-end/total form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingDescriptor {
    pub hactive: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub vactive: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub pixel_clock_khz: u32,
    pub polarity: SyncPolarity,
}

impl TimingDescriptor {
    pub fn from_blanking(h: Blanking, v: Blanking, pixel_clock_khz: u32,
                         polarity: SyncPolarity) -> Result<TimingDescriptor> {
        fn axis(b: &Blanking) -> Result<(u16, u16, u16)> {
            let start = b.active as u32 + b.front_porch as u32;
            let end = start + b.sync_width as u32;
            let total = b.total();
            if total > 0xffff {
                return Err(Error::InvalidTiming("total does not fit 16 bits"))
            }
            Ok((start as u16, end as u16, total as u16))
        }
        let (hsync_start, hsync_end, htotal) = axis(&h)?;
        let (vsync_start, vsync_end, vtotal) = axis(&v)?;
        Ok(TimingDescriptor {
            hactive: h.active, hsync_start, hsync_end, htotal,
            vactive: v.active, vsync_start, vsync_end, vtotal,
            pixel_clock_khz, polarity,
        })
    }

    /// Assumes the descriptor passed [`validate`](Self::validate).
    pub fn h_blanking(&self) -> Blanking {
        Blanking {
            active: self.hactive,
            front_porch: self.hsync_start - self.hactive,
            sync_width: self.hsync_end - self.hsync_start,
            back_porch: self.htotal - self.hsync_end,
        }
    }

    /// Assumes the descriptor passed [`validate`](Self::validate).
    pub fn v_blanking(&self) -> Blanking {
        Blanking {
            active: self.vactive,
            front_porch: self.vsync_start - self.vactive,
            sync_width: self.vsync_end - self.vsync_start,
            back_porch: self.vtotal - self.vsync_end,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hactive == 0 || self.vactive == 0 {
            return Err(Error::InvalidTiming("active area is empty"))
        }
        if !(self.hactive <= self.hsync_start && self.hsync_start <= self.hsync_end
                && self.hsync_end <= self.htotal) {
            return Err(Error::InvalidTiming("horizontal sync lies outside the line"))
        }
        if !(self.vactive <= self.vsync_start && self.vsync_start <= self.vsync_end
                && self.vsync_end <= self.vtotal) {
            return Err(Error::InvalidTiming("vertical sync lies outside the frame"))
        }
        if self.pixel_clock_khz == 0 {
            return Err(Error::InvalidTiming("pixel clock is zero"))
        }
        Ok(())
    }

    /// [`validate`](Self::validate) plus the coarse limits of the DSI input.
    pub fn check_bounds(&self) -> Result<()> {
        self.validate()?;
        if self.pixel_clock_khz > MAX_PIXEL_CLOCK_KHZ {
            return Err(Error::InvalidTiming("pixel clock above 150 MHz"))
        }
        if self.hactive > MAX_HACTIVE {
            return Err(Error::InvalidTiming("active width above 1920"))
        }
        if self.vactive > MAX_VACTIVE {
            return Err(Error::InvalidTiming("active height above 1080"))
        }
        Ok(())
    }
}

/// LVDS panel timing, in the porch form panels are specified in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LvdsTiming {
    pub h: Blanking,
    pub v: Blanking,
    pub pixel_clock_khz: u32,
}

impl LvdsTiming {
    pub fn validate(&self) -> Result<()> {
        if self.h.active == 0 || self.v.active == 0 {
            return Err(Error::InvalidTiming("LVDS active area is empty"))
        }
        if self.h.total() > 0xffff || self.v.total() > 0xffff {
            return Err(Error::InvalidTiming("LVDS total does not fit 16 bits"))
        }
        if self.pixel_clock_khz == 0 {
            return Err(Error::InvalidTiming("LVDS pixel clock is zero"))
        }
        Ok(())
    }
}

impl<'a> From<&'a TimingDescriptor> for LvdsTiming {
    /// The panel sees the DSI timing unchanged when the scaler is bypassed.
    fn from(timing: &'a TimingDescriptor) -> LvdsTiming {
        LvdsTiming {
            h: timing.h_blanking(),
            v: timing.v_blanking(),
            pixel_clock_khz: timing.pixel_clock_khz,
        }
    }
}

const fn mode(clock: u32, h: [u16; 4], v: [u16; 4]) -> TimingDescriptor {
    TimingDescriptor {
        hactive: h[0],
        hsync_start: h[0] + h[1],
        hsync_end: h[0] + h[1] + h[2],
        htotal: h[0] + h[1] + h[2] + h[3],
        vactive: v[0],
        vsync_start: v[0] + v[1],
        vsync_end: v[0] + v[1] + v[2],
        vtotal: v[0] + v[1] + v[2] + v[3],
        pixel_clock_khz: clock,
        polarity: SyncPolarity { hsync_high: true, vsync_high: true },
    }
}

/// Modes offered on HDMI when the sink provides none: active, front porch,
/// sync, back porch.
pub static BUILTIN_MODES: [TimingDescriptor; 2] = [
    mode(148_500, [1920, 88, 44, 148], [1080, 36, 5, 4]),   // 1080p60
    mode(74_250,  [1280, 110, 40, 220], [720, 5, 5, 20]),   // 720p60
];

/// Out-of-range indices fall back to 1080p60.
pub fn builtin_mode(index: usize) -> &'static TimingDescriptor {
    BUILTIN_MODES.get(index).unwrap_or(&BUILTIN_MODES[0])
}

/// Derived bank-B fields for one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipiTiming {
    pub h: Blanking,
    pub v: Blanking,
    pub htotal: u16,
    pub vtotal: u16,
}

impl MipiTiming {
    pub fn new(timing: &TimingDescriptor) -> Result<MipiTiming> {
        timing.validate()?;
        let (h, v) = (timing.h_blanking(), timing.v_blanking());
        if h.sync_width > 0xff || v.sync_width > 0xff {
            return Err(Error::InvalidTiming("sync width does not fit one byte"))
        }
        Ok(MipiTiming { h, v, htotal: timing.htotal, vtotal: timing.vtotal })
    }

    /// The receiver latches in this order: sync widths, active width,
    /// totals, back porches, front porches (vertical before horizontal).
    pub fn write<B: RegisterBus>(&self, regs: &mut Registers<B>) -> Result<()> {
        debug!("MIPI timing: h {}+{}+{}+{}={} v {}+{}+{}+{}={}",
               self.h.active, self.h.front_porch, self.h.sync_width, self.h.back_porch, self.htotal,
               self.v.active, self.v.front_porch, self.v.sync_width, self.v.back_porch, self.vtotal);
        regs.write(Reg::b(0x18), self.h.sync_width as u8)?;
        regs.write(Reg::b(0x19), self.v.sync_width as u8)?;
        regs.write_pair(Reg::b(0x1c), self.h.active)?;
        regs.write(Reg::b(0x1e), 0x67)?;
        regs.write(Reg::b(0x2f), 0x0c)?;
        regs.write_pair(Reg::b(0x34), self.htotal)?;
        regs.write_pair(Reg::b(0x36), self.vtotal)?;
        regs.write_pair(Reg::b(0x38), self.v.back_porch)?;
        regs.write_pair(Reg::b(0x3a), self.v.front_porch)?;
        regs.write_pair(Reg::b(0x3c), self.h.back_porch)?;
        regs.write_pair(Reg::b(0x3e), self.h.front_porch)?;
        Ok(())
    }
}
