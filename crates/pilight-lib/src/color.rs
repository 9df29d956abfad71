//! Color values, parsing and formatting.
//!
//! A color is three 8-bit channel intensities. On the wire to the PWM daemon
//! each channel becomes a fraction of full intensity (`v / 255`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Full channel intensity.
pub const CHANNEL_MAX: u8 = u8::MAX;

/// An RGB color, one byte per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// The light's logical channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
        }
    }
}

/// How `lighter`/`darker` treat the byte boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustMode {
    /// 8-bit wraparound: 250 + 10 = 4.
    #[default]
    Wrap,
    /// Clamp at 0 and 255.
    Saturate,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn get(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.r,
            Channel::Green => self.g,
            Channel::Blue => self.b,
        }
    }

    pub fn set(&mut self, channel: Channel, value: u8) {
        match channel {
            Channel::Red => self.r = value,
            Channel::Green => self.g = value,
            Channel::Blue => self.b = value,
        }
    }

    /// Add `delta` to every channel (negative to darken).
    pub fn adjust(self, delta: i16, mode: AdjustMode) -> Rgb {
        let step = |v: u8| -> u8 {
            match mode {
                // Truncating to u8 is the wraparound.
                AdjustMode::Wrap => (v as i16).wrapping_add(delta) as u8,
                AdjustMode::Saturate => (v as i16 + delta).clamp(0, CHANNEL_MAX as i16) as u8,
            }
        };
        Rgb::new(step(self.r), step(self.g), step(self.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Convert a channel value to the fraction the device expects.
pub fn to_fraction(value: u8) -> f64 {
    f64::from(value) / f64::from(CHANNEL_MAX)
}

/// Convert a fraction back to a channel value, rounding to nearest.
pub fn from_fraction(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * f64::from(CHANNEL_MAX)).round() as u8
}

/// Parse a color string.
///
/// Accepts:
/// - Hex: `"#c85d28"`, `"C85D28"`
/// - Named: `"red"`, `"green"`, `"blue"`, `"white"`, `"orange"`, `"yellow"`, `"purple"`, `"cyan"`, `"off"`
pub fn parse_color(s: &str) -> crate::error::Result<Rgb> {
    let s = s.trim();

    match s.to_lowercase().as_str() {
        "red" => return Ok(Rgb::new(0xFF, 0x00, 0x00)),
        "green" => return Ok(Rgb::new(0x00, 0xFF, 0x00)),
        "blue" => return Ok(Rgb::new(0x00, 0x00, 0xFF)),
        "white" => return Ok(Rgb::new(0xFF, 0xFF, 0xFF)),
        "orange" => return Ok(Rgb::new(0xFF, 0x80, 0x00)),
        "yellow" => return Ok(Rgb::new(0xFF, 0xFF, 0x00)),
        "purple" => return Ok(Rgb::new(0x80, 0x00, 0xFF)),
        "cyan" => return Ok(Rgb::new(0x00, 0xFF, 0xFF)),
        "off" | "black" => return Ok(Rgb::BLACK),
        _ => {}
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(crate::PilightError::Color(format!(
            "Invalid color: {s} (use #RRGGBB or a color name)"
        )));
    }
    let val = u32::from_str_radix(hex, 16)
        .map_err(|_| crate::PilightError::Color(format!("Invalid hex color: {s}")))?;
    Ok(Rgb::new((val >> 16) as u8, (val >> 8) as u8, val as u8))
}
