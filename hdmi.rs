//! HDMI AVI info-frame and audio set-up (bank C).

use byteorder::{BigEndian, ByteOrder};
use log::debug;
use num_enum::TryFromPrimitive;

use super::{Error, Result};
use super::regs::{Bank, Reg, RegisterBus, Registers};

/// The four governed AVI bytes (checksum, PB1, PB2, VIC) sum to this.
pub const AVI_SUM: u32 = 0x6f;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Colorspace {
    Rgb = 0x10,
    Yuv422 = 0x30,
    Yuv444 = 0x70,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum AspectRatio {
    Ratio4x3 = 0x19,
    Ratio16x9 = 0x2a,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AviInfoFrame {
    pub colorspace: Colorspace,
    pub aspect: AspectRatio,
    /// CEA video identification code; 0 for non-standard modes.
    pub vic: u8,
}

impl Default for AviInfoFrame {
    fn default() -> AviInfoFrame {
        AviInfoFrame {
            colorspace: Colorspace::Rgb,
            aspect: AspectRatio::Ratio16x9,
            vic: 0x10, // 1080p60
        }
    }
}

impl AviInfoFrame {
    pub fn checksum(&self) -> u8 {
        let sum = self.colorspace as u32 + self.aspect as u32 + self.vic as u32;
        let base = if sum <= AVI_SUM { AVI_SUM } else { AVI_SUM + 0x100 };
        base.wrapping_sub(sum) as u8
    }

    pub fn write<B: RegisterBus>(&self, regs: &mut Registers<B>) -> Result<()> {
        let checksum = self.checksum();
        debug!("AVI: VIC {} {:?} {:?} checksum 0x{:02x}",
               self.vic, self.colorspace, self.aspect, checksum);
        regs.write(Reg::c(0x3e), 0x0a)?;
        regs.write(Reg::c(0x43), checksum)?;
        regs.write(Reg::c(0x44), self.colorspace as u8)?;
        regs.write(Reg::c(0x45), self.aspect as u8)?;
        regs.write(Reg::c(0x47), self.vic)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum AudioMode {
    None = 0,
    Spdif = 1,
    I2s = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkType {
    Dvi = 0,
    Hdmi = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    Khz32,
    Khz44_1,
    Khz48,
    Khz88_2,
    Khz96,
    Khz176_4,
    Khz192,
}

const SAMPLE_RATES: [SampleRate; 7] = [
    SampleRate::Khz32, SampleRate::Khz44_1, SampleRate::Khz48, SampleRate::Khz88_2,
    SampleRate::Khz96, SampleRate::Khz176_4, SampleRate::Khz192,
];

const RATE_HZ: [u32; 7] = [32_000, 44_100, 48_000, 88_200, 96_000, 176_400, 192_000];

// Audio clock regeneration N, as recommended by HDMI for these rates.
const AUDIO_N: [u32; 7] = [4096, 6272, 6144, 12544, 12288, 25088, 24576];

// Channel status sample frequency code, bank C 0x0f bits 7:4.
const RATE_CODE: [u8; 7] = [0x30, 0x00, 0x20, 0x80, 0xa0, 0xc0, 0xe0];

impl SampleRate {
    pub fn from_hz(hz: u32) -> Result<SampleRate> {
        RATE_HZ.iter().position(|&rate| rate == hz)
            .map(|index| SAMPLE_RATES[index])
            .ok_or(Error::UnsupportedConfiguration("audio sample rate"))
    }

    pub fn hz(&self) -> u32 { RATE_HZ[*self as usize] }
    pub fn n(&self) -> u32 { AUDIO_N[*self as usize] }
    pub fn code(&self) -> u8 { RATE_CODE[*self as usize] }
}

/// Audio clock regeneration pair for a TMDS clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioClock {
    pub n: u32,
    pub cts: u32,
}

impl AudioClock {
    pub fn new(rate: SampleRate, f_tmds_khz: u32) -> AudioClock {
        let fs = rate.hz() as u64;
        let n = match rate {
            SampleRate::Khz44_1 | SampleRate::Khz88_2 | SampleRate::Khz176_4 => fs * 128 / 900,
            _ => fs * 128 / 1000,
        };
        let cts = f_tmds_khz as u64 * 1000 * n / (128 * fs);
        AudioClock { n: n as u32, cts: cts as u32 }
    }
}

const AUDIO_DISABLED: [(u8, u8); 4] = [(0x06, 0x00), (0x07, 0x00), (0x34, 0xd2), (0x3c, 0x41)];
const AUDIO_SPDIF: [(u8, u8); 3] = [(0x06, 0x0e), (0x07, 0x00), (0x34, 0xd2)];
const AUDIO_I2S: [(u8, u8); 3] = [(0x06, 0x08), (0x07, 0xf0), (0x09, 0x00)];

/// Everything the HDMI transmitter needs besides the video timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HdmiPackets {
    pub sink: SinkType,
    pub audio: AudioMode,
    pub rate: SampleRate,
    pub avi: AviInfoFrame,
}

impl HdmiPackets {
    pub fn write<B: RegisterBus>(&self, regs: &mut Registers<B>,
                                 pixel_clock_khz: u32) -> Result<()> {
        regs.write(Reg::a(0xb2), self.sink as u8)?;

        let template: &[(u8, u8)] = match self.audio {
            AudioMode::None  => &AUDIO_DISABLED,
            AudioMode::Spdif => &AUDIO_SPDIF,
            AudioMode::I2s   => &AUDIO_I2S,
        };
        regs.write_table(Bank::C, template)?;

        // CTS is measured by the transmitter; only N is programmed.
        let clock = AudioClock::new(self.rate, pixel_clock_khz);
        debug!("audio {:?} at {} Hz: N={} CTS={}", self.audio, self.rate.hz(), clock.n, clock.cts);
        let mut n = [0; 3];
        BigEndian::write_u24(&mut n, self.rate.n());
        regs.write(Reg::c(0x0f), 0x0b + self.rate.code())?;
        regs.write(Reg::c(0x37), n[0])?;
        regs.write(Reg::c(0x36), n[1])?;
        regs.write(Reg::c(0x35), n[2])?;
        regs.write(Reg::c(0x34), 0xd2)?;   // 32-bit sample slots
        regs.write(Reg::c(0x3c), 0x41)?;

        self.avi.write(regs)
    }
}
