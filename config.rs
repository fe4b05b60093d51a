//! Bridge configuration and its key/value loader.

use core::convert::TryFrom;
use core::str::FromStr;

use log::{info, warn};
use num_enum::TryFromPrimitive;

use super::{Error, Result};
pub use super::hdmi::{AspectRatio, AudioMode, AviInfoFrame, Colorspace, SampleRate, SinkType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum OutputMode {
    Lvds = 0,
    Hdmi = 1,
    Both = 2,
}

impl OutputMode {
    pub fn lvds_enabled(&self) -> bool {
        *self != OutputMode::Hdmi
    }

    pub fn hdmi_enabled(&self) -> bool {
        *self != OutputMode::Lvds
    }
}

/// Numbered the way the `bit_color` key numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum ColorDepth {
    Bits24 = 0,
    Bits18 = 1,
}

impl ColorDepth {
    /// Low bits of the LVDS format byte.
    pub fn lvds_code(&self) -> u8 {
        match *self {
            ColorDepth::Bits24 => 0x13,
            ColorDepth::Bits18 => 0x17,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    pub dsi_lanes: u8,
    pub output_mode: OutputMode,
    pub color_depth: ColorDepth,
    pub scaler: bool,
    /// Index into the built-in HDMI mode table.
    pub hdmi_mode: usize,
    pub avi: AviInfoFrame,
    pub sink: SinkType,
    pub audio_mode: AudioMode,
    pub sample_rate: SampleRate,
}

impl Default for BridgeConfig {
    fn default() -> BridgeConfig {
        BridgeConfig {
            dsi_lanes: 4,
            output_mode: OutputMode::Lvds,
            color_depth: ColorDepth::Bits24,
            scaler: false,
            hdmi_mode: 0,
            avi: AviInfoFrame::default(),
            sink: SinkType::Hdmi,
            audio_mode: AudioMode::None,
            sample_rate: SampleRate::Khz48,
        }
    }
}

/// Read-only key/value store the configuration is loaded from.
pub trait ConfigSource {
    fn read_str<F, R>(&self, key: &str, f: F) -> R
        where F: FnOnce(Option<&str>) -> R;
}

impl<'a> ConfigSource for [(&'a str, &'a str)] {
    fn read_str<F, R>(&self, key: &str, f: F) -> R
        where F: FnOnce(Option<&str>) -> R
    {
        f(self.iter().find(|&&(k, _)| k == key).map(|&(_, v)| v))
    }
}

fn parse_int<T: FromStr + TryFrom<u32>>(value: &str) -> Option<T> {
    let value = value.trim();
    if value.starts_with("0x") || value.starts_with("0X") {
        u32::from_str_radix(&value[2..], 16).ok().and_then(|v| T::try_from(v).ok())
    } else {
        value.parse().ok()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "0" | "false" | "off" => Some(false),
        "1" | "true" | "on" => Some(true),
        _ => None,
    }
}

fn parse_output_mode(value: &str) -> Option<OutputMode> {
    match value.trim() {
        "lvds" => Some(OutputMode::Lvds),
        "hdmi" => Some(OutputMode::Hdmi),
        "both" => Some(OutputMode::Both),
        other => parse_int::<u8>(other).and_then(|n| OutputMode::try_from(n).ok()),
    }
}

fn parse_audio_mode(value: &str) -> Option<AudioMode> {
    match value.trim() {
        "none" => Some(AudioMode::None),
        "spdif" => Some(AudioMode::Spdif),
        "i2s" => Some(AudioMode::I2s),
        other => parse_int::<u8>(other).and_then(|n| AudioMode::try_from(n).ok()),
    }
}

fn parse_bit_color(value: &str) -> Option<ColorDepth> {
    parse_int::<u8>(value).and_then(|n| ColorDepth::try_from(n).ok())
}

fn parse_color_depth(value: &str) -> Option<ColorDepth> {
    match value.trim() {
        "24" => Some(ColorDepth::Bits24),
        "18" => Some(ColorDepth::Bits18),
        _ => None,
    }
}

fn parse_lanes(value: &str) -> Option<u8> {
    parse_int::<u8>(value).filter(|&n| n >= 1 && n <= 4)
}

fn parse_colorspace(value: &str) -> Option<Colorspace> {
    match value.trim() {
        "rgb" => Some(Colorspace::Rgb),
        "yuv422" => Some(Colorspace::Yuv422),
        "yuv444" => Some(Colorspace::Yuv444),
        _ => None,
    }
}

fn parse_aspect(value: &str) -> Option<AspectRatio> {
    match value.trim() {
        "4:3" => Some(AspectRatio::Ratio4x3),
        "16:9" => Some(AspectRatio::Ratio16x9),
        _ => None,
    }
}

fn parse_sink(value: &str) -> Option<SinkType> {
    match value.trim() {
        "hdmi" => Some(SinkType::Hdmi),
        "dvi" => Some(SinkType::Dvi),
        _ => None,
    }
}

fn parse_sample_rate(value: &str) -> Option<SampleRate> {
    parse_int::<u32>(value).and_then(|hz| SampleRate::from_hz(hz).ok())
}

/// Overwrites `field` if `key` is present. Malformed values are rejected with
/// the key as the reason.
fn load_key<S, T>(source: &S, key: &'static str, field: &mut T,
                  parse: fn(&str) -> Option<T>) -> Result<()>
    where S: ConfigSource + ?Sized
{
    source.read_str(key, |value| {
        match value {
            None => Ok(()),
            Some(value) => match parse(value) {
                Some(parsed) => {
                    *field = parsed;
                    Ok(())
                }
                None => {
                    warn!("rejecting {}={:?}", key, value);
                    Err(Error::UnsupportedConfiguration(key))
                }
            }
        }
    })
}

impl BridgeConfig {
    pub fn load<S: ConfigSource + ?Sized>(source: &S) -> Result<BridgeConfig> {
        info!("loading configuration...");
        let mut config = BridgeConfig::default();
        load_key(source, "dsi_lanes", &mut config.dsi_lanes, parse_lanes)?;
        load_key(source, "output_mode", &mut config.output_mode, parse_output_mode)?;
        load_key(source, "bit_color", &mut config.color_depth, parse_bit_color)?;
        load_key(source, "color_depth", &mut config.color_depth, parse_color_depth)?;
        load_key(source, "scaler", &mut config.scaler, parse_bool)?;
        load_key(source, "hdmi_mode", &mut config.hdmi_mode, parse_int::<usize>)?;
        load_key(source, "vic", &mut config.avi.vic, parse_int::<u8>)?;
        load_key(source, "colorspace", &mut config.avi.colorspace, parse_colorspace)?;
        load_key(source, "aspect", &mut config.avi.aspect, parse_aspect)?;
        load_key(source, "sink", &mut config.sink, parse_sink)?;
        load_key(source, "audio_mode", &mut config.audio_mode, parse_audio_mode)?;
        load_key(source, "audio_sample_rate", &mut config.sample_rate, parse_sample_rate)?;
        config.validate()?;
        info!("  ...done: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dsi_lanes < 1 || self.dsi_lanes > 4 {
            return Err(Error::UnsupportedConfiguration("DSI lane count must be 1 to 4"))
        }
        if self.scaler && !self.output_mode.lvds_enabled() {
            return Err(Error::UnsupportedConfiguration("scaler requires the LVDS output"))
        }
        Ok(())
    }
}
