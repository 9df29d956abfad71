//! pilight — one RGB light behind a pi-blaster PWM daemon, shared safely
//! between any number of concurrent callers.

pub mod action;
pub mod actor;
pub mod color;
pub mod config;
pub mod device;
pub mod error;
pub mod guard;
pub mod transform;

pub use error::PilightError;
