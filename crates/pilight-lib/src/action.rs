//! Request actions — the closed set of things a caller can ask the light to do.

use std::collections::HashMap;

use crate::actor::BlasterHandle;
use crate::color::{AdjustMode, Rgb};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Set an explicit color.
    Set(Rgb),
    /// Turn the light off.
    Off,
    /// Raise every channel by the adjust step.
    Lighter,
    /// Lower every channel by the adjust step.
    Darker,
    /// Change nothing, just report the color.
    Show,
}

/// Parse a decimal channel value; anything unparsable counts as 0.
fn channel_or_zero(s: Option<&String>) -> u8 {
    s.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

impl Action {
    /// Build an action from request parameters (`action`, `r`, `g`, `b`).
    ///
    /// A missing or unknown `action` is [`Action::Show`].
    pub fn from_params(params: &HashMap<String, String>) -> Action {
        match params.get("action").map(String::as_str) {
            Some("set") => Action::Set(Rgb::new(
                channel_or_zero(params.get("r")),
                channel_or_zero(params.get("g")),
                channel_or_zero(params.get("b")),
            )),
            Some("off") => Action::Off,
            Some("lighter") => Action::Lighter,
            Some("darker") => Action::Darker,
            Some(other) => {
                log::debug!("unknown action {other:?}, reporting color only");
                Action::Show
            }
            None => Action::Show,
        }
    }

    /// Whether running this action sends a `SetColor`.
    pub fn changes_color(&self) -> bool {
        !matches!(self, Action::Show)
    }

    /// Send the messages for this action, then report the resulting color.
    pub async fn run(self, blaster: &BlasterHandle, step: u8, mode: AdjustMode) -> Result<Rgb> {
        let delta = i16::from(step);
        match self {
            Action::Set(color) => blaster.set_color(color).await?,
            Action::Off => blaster.set_color(Rgb::BLACK).await?,
            Action::Lighter => {
                let current = blaster.current_color().await?;
                blaster.set_color(current.adjust(delta, mode)).await?;
            }
            Action::Darker => {
                let current = blaster.current_color().await?;
                blaster.set_color(current.adjust(-delta, mode)).await?;
            }
            Action::Show => {}
        }
        let color = blaster.current_color().await?;
        log::info!("{self:?} -> {color}");
        Ok(color)
    }
}
