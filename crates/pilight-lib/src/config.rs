//! Application configuration — TOML-based, platform-aware paths.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actor::{BlasterSettings, Store};
use crate::color::{AdjustMode, Channel, CHANNEL_MAX};
use crate::device::Pins;
use crate::transform::{Correction, Transform};

/// Header comment prepended to saved config files.
const CONFIG_HEADER: &str = "# pilight configuration\n\n";

/// Which transform runs on every color change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    /// Per-channel correction, written in one step.
    #[default]
    Gamma,
    /// Unit steps from the current color to the target.
    Fade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// pi-blaster FIFO. Default: "/dev/pi-blaster".
    #[serde(default = "default_device_path")]
    pub device_path: PathBuf,

    /// Command that starts the PWM daemon when the FIFO is missing.
    #[serde(default = "default_daemon_command")]
    pub daemon_command: String,

    /// HTTP listen address. Default: "0.0.0.0:1337".
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory holding index.html and static assets.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Minimum spacing between color changes from the HTTP side, in milliseconds.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// How long a color reply may wait for its caller, in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    #[serde(default)]
    pub transform: TransformKind,

    /// Whether queries report the corrected or the requested color.
    #[serde(default)]
    pub store: Store,

    /// Per-channel step for `lighter` / `darker`.
    #[serde(default = "default_adjust_step")]
    pub adjust_step: u8,

    /// Wraparound or saturating arithmetic for `lighter` / `darker`.
    #[serde(default)]
    pub adjust: AdjustMode,

    #[serde(default)]
    pub pins: Pins,

    /// Gamma correction numerators (over 255).
    #[serde(default)]
    pub correction: Correction,
}

fn default_device_path() -> PathBuf {
    PathBuf::from("/dev/pi-blaster")
}
fn default_daemon_command() -> String {
    "pi-blaster".into()
}
fn default_listen() -> String {
    "0.0.0.0:1337".into()
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("templates")
}
fn default_cooldown_ms() -> u64 {
    10
}
fn default_query_timeout_ms() -> u64 {
    5000
}
fn default_adjust_step() -> u8 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device_path: default_device_path(),
            daemon_command: default_daemon_command(),
            listen: default_listen(),
            static_dir: default_static_dir(),
            cooldown_ms: default_cooldown_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            transform: TransformKind::default(),
            store: Store::default(),
            adjust_step: default_adjust_step(),
            adjust: AdjustMode::default(),
            pins: Pins::default(),
            correction: Correction::default(),
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Two channels are assigned the same GPIO pin.
    DuplicatePin {
        pin: u8,
        first: &'static str,
        second: &'static str,
    },
    /// A correction numerator would push channels past full intensity.
    CorrectionTooLarge { channel: &'static str, value: u16 },
    /// `adjust_step` is zero, so lighter/darker would do nothing.
    ZeroAdjustStep,
    /// `query_timeout_ms` is zero, so every reply would be abandoned.
    ZeroQueryTimeout,
    /// `listen` is not a socket address.
    InvalidListen(String),
    /// `daemon_command` is empty or whitespace-only.
    EmptyDaemonCommand,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicatePin { pin, first, second } => {
                write!(f, "Pin {pin} is assigned to both {first} and {second}")
            }
            ValidationError::CorrectionTooLarge { channel, value } => write!(
                f,
                "Correction for {channel} is {value}, must be at most {CHANNEL_MAX}"
            ),
            ValidationError::ZeroAdjustStep => write!(f, "adjust_step must be at least 1"),
            ValidationError::ZeroQueryTimeout => {
                write!(f, "query_timeout_ms must be at least 1")
            }
            ValidationError::InvalidListen(e) => write!(f, "Invalid listen address: {e}"),
            ValidationError::EmptyDaemonCommand => write!(f, "daemon_command cannot be empty"),
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pilight"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Save config to an arbitrary path atomically (write to temp file, then rename).
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        let contents = format!("{CONFIG_HEADER}{serialized}");
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &contents)?;
        match std::fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(_) => {
                // Rename can fail across filesystems; fall back to direct write + cleanup
                let result = std::fs::write(path, &contents);
                let _ = std::fs::remove_file(&tmp);
                result
            }
        }
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn listen_addr(&self) -> crate::error::Result<SocketAddr> {
        self.listen
            .trim()
            .parse()
            .map_err(|e| crate::PilightError::Config(format!("listen = {:?}: {e}", self.listen)))
    }

    /// The actor parameters this config describes.
    pub fn blaster_settings(&self) -> BlasterSettings {
        let transform = match self.transform {
            TransformKind::Gamma => Transform::Gamma(self.correction),
            TransformKind::Fade => Transform::Fade,
        };
        BlasterSettings {
            pins: self.pins,
            transform,
            store: self.store,
            query_timeout: self.query_timeout(),
        }
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let channels = Channel::ALL;
        for (i, a) in channels.iter().enumerate() {
            for b in &channels[i + 1..] {
                let pin = self.pins.pin(*a);
                if pin == self.pins.pin(*b) {
                    errors.push(ValidationError::DuplicatePin {
                        pin,
                        first: a.name(),
                        second: b.name(),
                    });
                }
            }
        }

        for (channel, value) in [
            ("red", self.correction.red),
            ("green", self.correction.green),
            ("blue", self.correction.blue),
        ] {
            if value > u16::from(CHANNEL_MAX) {
                errors.push(ValidationError::CorrectionTooLarge { channel, value });
            }
        }

        if self.adjust_step == 0 {
            errors.push(ValidationError::ZeroAdjustStep);
        }
        if self.query_timeout_ms == 0 {
            errors.push(ValidationError::ZeroQueryTimeout);
        }
        if let Err(e) = self.listen_addr() {
            errors.push(ValidationError::InvalidListen(e.to_string()));
        }
        if self.daemon_command.trim().is_empty() {
            errors.push(ValidationError::EmptyDaemonCommand);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
