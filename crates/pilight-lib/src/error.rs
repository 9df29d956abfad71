//! Unified error type for the pilight-lib crate.
//!
//! [`PilightError`] wraps module-specific errors (`DeviceError`, `DeliveryError`)
//! and domain-specific error kinds (`Config`, `Color`).
//! `From` impls allow `?` to propagate across module boundaries seamlessly.

use std::fmt;

use crate::device::DeviceError;
use crate::guard::DeliveryError;

/// Unified error type for pilight-lib operations.
#[derive(Debug)]
pub enum PilightError {
    /// PWM device error (open, daemon start, channel write).
    Device(DeviceError),
    /// A query reply could not be handed to its caller.
    Delivery(DeliveryError),
    /// Standard I/O error (file read/write, config persistence).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
    /// Color parsing error.
    Color(String),
    /// The arbitration actor has stopped and no longer accepts messages.
    ActorClosed,
}

impl fmt::Display for PilightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PilightError::Device(e) => write!(f, "{e}"),
            PilightError::Delivery(e) => write!(f, "{e}"),
            PilightError::Io(e) => write!(f, "I/O error: {e}"),
            PilightError::Config(e) => write!(f, "Config error: {e}"),
            PilightError::Color(e) => write!(f, "Color error: {e}"),
            PilightError::ActorClosed => write!(f, "Light controller is not running"),
        }
    }
}

impl std::error::Error for PilightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PilightError::Device(e) => Some(e),
            PilightError::Delivery(e) => Some(e),
            PilightError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for PilightError {
    fn from(e: DeviceError) -> Self {
        PilightError::Device(e)
    }
}

impl From<DeliveryError> for PilightError {
    fn from(e: DeliveryError) -> Self {
        PilightError::Delivery(e)
    }
}

impl From<std::io::Error> for PilightError {
    fn from(e: std::io::Error) -> Self {
        PilightError::Io(e)
    }
}

/// Crate-level Result alias using [`PilightError`].
pub type Result<T> = std::result::Result<T, PilightError>;
