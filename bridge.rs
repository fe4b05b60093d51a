//! Power and configuration lifecycle of one LT8912.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, error, info, warn};
use spin::Mutex;

use super::{Error, IoFault, Result};
use super::config::BridgeConfig;
use super::hdmi::HdmiPackets;
use super::lvds::{self, OutputPath, ScalerPlan};
use super::ratio::CorePllDivider;
use super::regs::{check_address, wait, Bank, Reg, RegisterBus, Registers};
use super::timing::{builtin_mode, LvdsTiming, MipiTiming, TimingDescriptor};

const RESET_SETTLE: Duration = Duration::from_millis(100);
const LATCH_SETTLE: Duration = Duration::from_millis(10);

const SOFT_RESET: Reg = Reg::a(0x03);
const DDS_LATCH: Reg = Reg::b(0x51);

const CLOCKS_LVDS: [(u8, u8); 6] = [
    (0x08, 0xff), (0x09, 0xff), (0x0a, 0xff), (0x0b, 0x7c), (0x0c, 0xff), (0x51, 0x15),
];
const CLOCKS_HDMI_ONLY: [(u8, u8); 7] = [
    (0x08, 0xff), (0x09, 0x81), (0x0a, 0xff), (0x0b, 0x64), (0x0c, 0xff), (0x44, 0x31),
    (0x51, 0x1f),
];
const TX_ANALOG: [(u8, u8); 6] = [
    (0x31, 0xa1), (0x32, 0xbf), (0x33, 0x17), (0x37, 0x00), (0x38, 0x22), (0x60, 0x82),
];
const CBUS_ANALOG: [(u8, u8); 3] = [(0x39, 0x45), (0x3a, 0x00), (0x3b, 0x00)];
const MIPI_ANALOG: [(u8, u8); 3] = [(0x3e, 0xc6), (0x3f, 0xd4), (0x41, 0x7c)];
const HDMI_PLL_ANALOG: [(u8, u8); 4] = [(0x44, 0x31), (0x55, 0x44), (0x57, 0x01), (0x5a, 0x02)];

// Bank B. 0x51 is written twice: the DDS is held in reset while it is loaded.
const DDS_CONFIG: [(u8, u8); 46] = [
    (0x4e, 0x52), (0x4f, 0xde), (0x50, 0xc0), (0x51, 0x80), (0x51, 0x00),
    (0x1e, 0x4f), (0x1f, 0x5e), (0x20, 0x01), (0x21, 0x2c), (0x22, 0x01), (0x23, 0xfa),
    (0x24, 0x00), (0x25, 0xc8), (0x26, 0x00), (0x27, 0x5e), (0x28, 0x01), (0x29, 0x2c),
    (0x2a, 0x01), (0x2b, 0xfa), (0x2c, 0x00), (0x2d, 0xc8), (0x2e, 0x00), (0x42, 0x64),
    (0x43, 0x00), (0x44, 0x04), (0x45, 0x00), (0x46, 0x59), (0x47, 0x00), (0x48, 0xf2),
    (0x49, 0x06), (0x4a, 0x00), (0x4b, 0x72), (0x4c, 0x45), (0x4d, 0x00), (0x52, 0x08),
    (0x53, 0x00), (0x54, 0xb2), (0x55, 0x00), (0x56, 0xe4), (0x57, 0x0d), (0x58, 0x00),
    (0x59, 0xe4), (0x5a, 0x8a), (0x5b, 0x00), (0x5c, 0x34), (0x51, 0x00),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Reset,
    Awake,
    Initialized,
    Active,
    Asleep,
}

/// Stop request for [`Bridge::bring_up`], settable from another context.
/// Only looked at between transitions.
pub struct Cancellation(AtomicBool);

impl Cancellation {
    pub const fn new() -> Cancellation {
        Cancellation(AtomicBool::new(false))
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for Cancellation {
    fn default() -> Cancellation {
        Cancellation::new()
    }
}

mod claim {
    use core::sync::atomic::{AtomicU32, Ordering};
    use super::super::{Error, Result};

    // One bit per 7-bit bus address.
    static CLAIMED: [AtomicU32; 4] = [
        AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0),
    ];

    fn slot(address: u8) -> (&'static AtomicU32, u32) {
        (&CLAIMED[(address as usize >> 5) & 3], 1 << (address & 31))
    }

    pub struct Claim(u8);

    impl Claim {
        pub fn take(address: u8) -> Result<Claim> {
            if address > 0x7f {
                return Err(Error::UnsupportedConfiguration("bus address is wider than 7 bits"))
            }
            let (word, bit) = slot(address);
            if word.fetch_or(bit, Ordering::SeqCst) & bit != 0 {
                Err(Error::AlreadyOwned)
            } else {
                Ok(Claim(address))
            }
        }
    }

    impl Drop for Claim {
        fn drop(&mut self) {
            let (word, bit) = slot(self.0);
            word.fetch_and(!bit, Ordering::SeqCst);
        }
    }
}

use self::claim::Claim;

/// Everything one initialization pass writes, derived before the first write.
struct Plan {
    mipi: MipiTiming,
    pixel_clock_khz: u32,
    core_pll: Option<CorePllDivider>,
    output: OutputPath,
    packets: HdmiPackets,
}

struct Inner<B, R, D> {
    regs: Registers<B>,
    reset: R,
    delay: D,
    config: BridgeConfig,
    state: BridgeState,
    configured: bool,
    timing: Option<TimingDescriptor>,
    lvds: Option<LvdsTiming>,
}

impl<B: RegisterBus, R: OutputPin, D: DelayNs> Inner<B, R, D> {
    fn require(&self, state: BridgeState, operation: &'static str) -> Result<()> {
        if self.state != state {
            return Err(Error::InvalidState { state: self.state, operation })
        }
        Ok(())
    }

    // RESET_N is active low.
    fn set_reset(&mut self, asserted: bool) -> Result<()> {
        let result = if asserted { self.reset.set_low() } else { self.reset.set_high() };
        result.map_err(|_| {
            error!("failed to drive the reset line");
            Error::Io(IoFault::ResetLine)
        })
    }

    fn wake(&mut self) -> Result<()> {
        info!("waking up...");
        self.configured = false;
        self.set_reset(true)?;
        self.state = BridgeState::Reset;
        wait(&mut self.delay, RESET_SETTLE);
        self.set_reset(false)?;
        wait(&mut self.delay, RESET_SETTLE);
        self.regs.clear_mirror();

        let now = Duration::from_millis(0);
        self.regs.write(Reg::a(0x08), 0xff)?;       // clock gating on
        self.regs.write(Reg::a(0x41), 0x3c)?;       // MIPI RX power on
        self.regs.pulse_bit(&mut self.delay, Reg::a(0x05), 0xff, 0x04, now)?;  // DDS
        self.regs.pulse_bit(&mut self.delay, SOFT_RESET, 0xff, 0x80, LATCH_SETTLE)?;  // MIPI RX
        self.regs.write(Reg::a(0x32), 0xa1)?;       // HDMI TX on
        self.regs.write(Reg::a(0x33), 0x03)?;
        self.state = BridgeState::Awake;
        info!("  ...awake");
        Ok(())
    }

    fn plan(&self) -> Result<Plan> {
        let config = &self.config;
        let timing = match self.timing {
            Some(ref timing) => timing,
            None => builtin_mode(config.hdmi_mode),
        };
        timing.check_bounds()?;
        let mipi = MipiTiming::new(timing)?;

        let output = if config.scaler {
            let panel = self.lvds
                .ok_or(Error::InvalidTiming("scaler needs the LVDS panel timing"))?;
            OutputPath::Scaler(ScalerPlan::new(timing, &panel)?)
        } else {
            OutputPath::Bypass
        };
        let core_pll = if config.output_mode.lvds_enabled() {
            let panel = self.lvds.unwrap_or_else(|| LvdsTiming::from(timing));
            panel.validate()?;
            Some(CorePllDivider::from_clock_khz(panel.pixel_clock_khz)?)
        } else {
            None
        };

        Ok(Plan {
            mipi,
            pixel_clock_khz: timing.pixel_clock_khz,
            core_pll,
            output,
            packets: HdmiPackets {
                sink: config.sink,
                audio: config.audio_mode,
                rate: config.sample_rate,
                avi: config.avi,
            },
        })
    }

    fn configure(&mut self, plan: &Plan) -> Result<()> {
        let lvds_enabled = plan.core_pll.is_some();
        let clocks: &[(u8, u8)] = if lvds_enabled { &CLOCKS_LVDS } else { &CLOCKS_HDMI_ONLY };
        self.regs.write_table(Bank::A, clocks)?;
        self.regs.write_table(Bank::A, &TX_ANALOG)?;
        self.regs.write_table(Bank::A, &CBUS_ANALOG)?;
        self.regs.write_table(Bank::A, &MIPI_ANALOG)?;
        self.regs.write_table(Bank::A, &HDMI_PLL_ANALOG)?;

        debug!("MIPI: {} lanes", self.config.dsi_lanes);
        self.regs.write_table(Bank::B, &[
            (0x10, 0x01),       // term en
            (0x11, 0x08),       // settle
            (0x12, 0x04),       // trail
            (0x13, self.config.dsi_lanes % 4),
            (0x14, 0x00),       // debug mux
            (0x15, 0x00),
            (0x1a, 0x03),       // hshift
            (0x1b, 0x03),       // vshift
        ])?;

        plan.mipi.write(&mut self.regs)?;
        self.regs.write_table(Bank::B, &DDS_CONFIG)?;
        plan.packets.write(&mut self.regs, plan.pixel_clock_khz)?;

        self.regs.pulse_bit(&mut self.delay, SOFT_RESET, 0xff, 0x80, LATCH_SETTLE)?;
        self.regs.strobe_bit(&mut self.delay, DDS_LATCH, 0x00, 0x80, LATCH_SETTLE)?;

        if let Some(ref divider) = plan.core_pll {
            lvds::write_core_pll(&mut self.regs, &mut self.delay, divider)?;
        }
        plan.output.write(&mut self.regs, &mut self.delay, self.config.color_depth)?;
        if lvds_enabled {
            self.regs.write(Reg::a(0x44), 0x30)?;   // LVDS output enable
        }
        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        self.require(BridgeState::Awake, "initialize")?;
        let plan = self.plan()?;
        info!("configuring {:?} output...", self.config.output_mode);
        self.state = BridgeState::Initialized;
        match self.configure(&plan) {
            Ok(()) => {
                self.configured = true;
                info!("  ...done ({} writes)", self.regs.write_count());
                Ok(())
            }
            Err(err) => {
                error!("configuration aborted: {}", err);
                Err(err)
            }
        }
    }

    fn activate(&mut self) -> Result<()> {
        self.require(BridgeState::Initialized, "activate")?;
        if !self.configured {
            return Err(Error::InvalidState { state: self.state, operation: "activate" })
        }
        self.state = BridgeState::Active;
        Ok(())
    }

    fn sleep(&mut self) -> Result<()> {
        match self.state {
            BridgeState::Reset | BridgeState::Asleep => {
                debug!("already powered down");
                return Ok(())
            }
            _ => ()
        }
        info!("going to sleep");
        self.regs.write(Reg::a(0x32), 0xa0)?;       // HDMI TX off
        self.regs.write(Reg::a(0x33), 0x00)?;
        self.regs.write(Reg::a(0x41), 0x3d)?;       // MIPI RX power down
        self.regs.write(Reg::a(0x08), 0x00)?;       // clock gating off
        self.set_reset(true)?;
        self.state = BridgeState::Asleep;
        self.configured = false;
        Ok(())
    }

    fn check_cancel(&mut self, cancel: &Cancellation) -> Result<()> {
        if cancel.is_requested() {
            warn!("bring-up cancelled in state {:?}", self.state);
            self.sleep()?;
            return Err(Error::Cancelled)
        }
        Ok(())
    }
}

/// Exclusive handle on one bridge chip. Each operation runs under a lock, so
/// a sequence is never interleaved with another.
pub struct Bridge<B, R, D> {
    inner: Mutex<Inner<B, R, D>>,
    claim: Claim,
}

impl<B: RegisterBus, R: OutputPin, D: DelayNs> Bridge<B, R, D> {
    pub fn new(bus: B, reset: R, delay: D, config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        check_address(bus.address())?;
        let claim = Claim::take(bus.address())?;
        debug!("claimed bridge at 0x{:02x}", bus.address());
        Ok(Bridge {
            inner: Mutex::new(Inner {
                regs: Registers::new(bus),
                reset,
                delay,
                config,
                state: BridgeState::Reset,
                configured: false,
                timing: None,
                lvds: None,
            }),
            claim,
        })
    }

    pub fn state(&self) -> BridgeState {
        self.inner.lock().state
    }

    pub fn config(&self) -> BridgeConfig {
        self.inner.lock().config
    }

    /// Last value written to `reg` since the last hardware reset.
    pub fn mirror(&self, reg: Reg) -> Option<u8> {
        self.inner.lock().regs.mirror(reg)
    }

    /// Stores the timing used by the next [`initialize`](Self::initialize).
    /// Without one, HDMI falls back to the built-in mode table.
    pub fn set_mode(&self, timing: TimingDescriptor, lvds: Option<LvdsTiming>) -> Result<()> {
        timing.check_bounds()?;
        if let Some(ref panel) = lvds {
            panel.validate()?;
        }
        debug!("mode {}x{} @ {} kHz", timing.hactive, timing.vactive, timing.pixel_clock_khz);
        let mut inner = self.inner.lock();
        inner.timing = Some(timing);
        inner.lvds = lvds;
        Ok(())
    }

    /// Full hardware reset followed by the power-on template. Allowed from
    /// any state.
    pub fn wake(&self) -> Result<()> {
        self.inner.lock().wake()
    }

    /// Writes the complete configuration. Everything is computed first;
    /// invalid timing or configuration fails without touching the chip. A
    /// transport failure part way leaves the state at `Initialized` without
    /// the configured flag, and only `wake` recovers from that.
    pub fn initialize(&self) -> Result<()> {
        self.inner.lock().initialize()
    }

    pub fn activate(&self) -> Result<()> {
        self.inner.lock().activate()
    }

    pub fn sleep(&self) -> Result<()> {
        self.inner.lock().sleep()
    }

    /// Wake, initialize and activate under one lock. `cancel` is checked
    /// between steps; when set, the chip is put to sleep and `Cancelled`
    /// is returned.
    pub fn bring_up(&self, cancel: &Cancellation) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.wake()?;
        inner.check_cancel(cancel)?;
        inner.initialize()?;
        inner.check_cancel(cancel)?;
        inner.activate()
    }

    /// Puts the chip to sleep and gives the peripherals back. The ownership
    /// claim is released even if sleeping fails.
    pub fn shutdown(self) -> Result<(B, R, D)> {
        let Bridge { inner, claim } = self;
        let mut inner = inner.into_inner();
        let result = inner.sleep();
        drop(claim);
        result?;
        Ok((inner.regs.into_inner(), inner.reset, inner.delay))
    }
}
