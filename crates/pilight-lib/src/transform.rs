//! Color transforms applied between a requested color and the device.
//!
//! Two policies exist:
//! - [`Transform::Gamma`] scales each channel by a fixed correction factor and
//!   writes the result in one step per channel.
//! - [`Transform::Fade`] walks each channel one unit at a time from the current
//!   value to the target, writing every intermediate value.

use serde::{Deserialize, Serialize};

use crate::color::{CHANNEL_MAX, Channel, Rgb};

/// Per-channel correction, expressed as numerators over 255.
///
/// The defaults compensate for the green and blue LEDs being much brighter
/// than the red one at equal duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    #[serde(default = "default_red")]
    pub red: u16,
    #[serde(default = "default_green")]
    pub green: u16,
    #[serde(default = "default_blue")]
    pub blue: u16,
}

fn default_red() -> u16 {
    0xFF
}
fn default_green() -> u16 {
    0x77
}
fn default_blue() -> u16 {
    0x33
}

impl Default for Correction {
    fn default() -> Self {
        Correction {
            red: default_red(),
            green: default_green(),
            blue: default_blue(),
        }
    }
}

impl Correction {
    fn numerator(&self, channel: Channel) -> u16 {
        match channel {
            Channel::Red => self.red,
            Channel::Green => self.green,
            Channel::Blue => self.blue,
        }
    }

    /// Scale one channel value, truncating toward zero.
    pub fn correct_channel(&self, channel: Channel, value: u8) -> i32 {
        i32::from(value) * i32::from(self.numerator(channel)) / i32::from(CHANNEL_MAX)
    }

    /// Scale every channel of `color`.
    pub fn apply(&self, color: Rgb) -> Levels {
        Levels {
            r: self.correct_channel(Channel::Red, color.r),
            g: self.correct_channel(Channel::Green, color.g),
            b: self.correct_channel(Channel::Blue, color.b),
        }
    }
}

/// Device-bound channel levels before range validation.
///
/// A misconfigured correction numerator can push a level above 255; the
/// device writer rejects those rather than clipping them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Levels {
    pub r: i32,
    pub g: i32,
    pub b: i32,
}

impl Levels {
    pub fn get(&self, channel: Channel) -> i32 {
        match channel {
            Channel::Red => self.r,
            Channel::Green => self.g,
            Channel::Blue => self.b,
        }
    }
}

/// Which transform the arbitration actor runs on each `SetColor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Gamma(Correction),
    Fade,
}

impl Default for Transform {
    fn default() -> Self {
        Transform::Gamma(Correction::default())
    }
}

/// Iterator over the unit steps from one channel value to another.
///
/// Yields every value strictly after `from`, ending with `to`. Yields nothing
/// when the two are equal.
#[derive(Debug, Clone)]
pub struct FadeSteps {
    current: u8,
    target: u8,
}

impl Iterator for FadeSteps {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        use std::cmp::Ordering;
        match self.current.cmp(&self.target) {
            Ordering::Less => self.current += 1,
            Ordering::Greater => self.current -= 1,
            Ordering::Equal => return None,
        }
        Some(self.current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::from(self.current.abs_diff(self.target));
        (n, Some(n))
    }
}

impl ExactSizeIterator for FadeSteps {}

pub fn fade_steps(from: u8, to: u8) -> FadeSteps {
    FadeSteps {
        current: from,
        target: to,
    }
}
