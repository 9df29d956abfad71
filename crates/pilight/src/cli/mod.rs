//! CLI subcommands — serve, one-shot color changes, config display.

mod config_cmd;
mod serve;
mod set;

use std::path::Path;

use clap::Subcommand;
use serde::Serialize;
use tokio::task::JoinHandle;

pub(super) use pilight_lib::actor::{self, BlasterHandle};
pub(super) use pilight_lib::color;
pub(super) use pilight_lib::config::Config;
pub(super) use pilight_lib::device::{self, DeviceWriter};
pub(super) use pilight_lib::error::{PilightError, Result};

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub problems: Vec<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the web interface (default)
    Serve,

    /// Set the light to a color and exit
    Set {
        /// Color as #RRGGBB or a name (red, green, blue, white, ...)
        color: String,
    },

    /// Turn the light off and exit
    Off,

    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub red: Option<u8>,
    pub green: Option<u8>,
    pub blue: Option<u8>,
    pub cooldown_ms: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(pin) = self.red {
            config.pins.red = pin;
        }
        if let Some(pin) = self.green {
            config.pins.green = pin;
        }
        if let Some(pin) = self.blue {
            config.pins.blue = pin;
        }
        if let Some(ms) = self.cooldown_ms {
            config.cooldown_ms = ms;
        }
    }
}

/// Load config from `custom_path` or the default location, then apply overrides.
pub fn load_config(custom_path: Option<&Path>, overrides: &Overrides) -> Config {
    let mut config = match custom_path {
        Some(path) => {
            let (config, warnings) = Config::load_from(path);
            for w in &warnings {
                log::warn!("{w}");
            }
            config
        }
        None => Config::load(),
    };
    overrides.apply(&mut config);
    config
}

/// Reject an invalid config before touching the device.
fn ensure_valid(config: &Config) -> Result<()> {
    config.validate().map_err(|errors| {
        let joined: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        PilightError::Config(joined.join("; "))
    })
}

/// Open the device (starting the daemon if needed) and spawn the actor.
///
/// Fails if the device cannot be opened; nothing is served without it.
pub(super) async fn start_blaster(config: &Config) -> Result<(BlasterHandle, JoinHandle<()>)> {
    ensure_valid(config)?;
    let file = device::open_device(&config.device_path, &config.daemon_command).await?;
    Ok(actor::spawn(
        DeviceWriter::new(file),
        config.blaster_settings(),
    ))
}

pub async fn run(cmd: Command, config: Config, custom_path: Option<&Path>) -> Result<()> {
    match cmd {
        Command::Serve => serve::cmd_serve(config).await,
        Command::Set { color } => {
            let color = color::parse_color(&color)?;
            set::cmd_set(config, color).await
        }
        Command::Off => set::cmd_set(config, color::Rgb::BLACK).await,
        Command::Config { json } => config_cmd::cmd_config(&config, custom_path, json),
    }
}


#[cfg(test)]
mod override_tests {
    use super::*;

    #[test]
    fn overrides_replace_pins_and_cooldown() {
        let mut c = Config::default();
        Overrides {
            red: Some(4),
            green: None,
            blue: Some(6),
            cooldown_ms: Some(0),
        }
        .apply(&mut c);
        assert_eq!(c.pins.red, 4);
        assert_eq!(c.pins.green, 22);
        assert_eq!(c.pins.blue, 6);
        assert_eq!(c.cooldown_ms, 0);
    }

    #[test]
    fn empty_overrides_change_nothing() {
        let mut c = Config::default();
        Overrides::default().apply(&mut c);
        assert_eq!(c, Config::default());
    }

    #[test]
    fn load_config_from_custom_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "cooldown_ms = 99\n[pins]\nred = 5\n").unwrap();
        let c = load_config(Some(&path), &Overrides::default());
        assert_eq!(c.cooldown_ms, 99);
        assert_eq!(c.pins.red, 5);

        let c = load_config(
            Some(&path),
            &Overrides {
                red: Some(12),
                ..Overrides::default()
            },
        );
        assert_eq!(c.pins.red, 12);
    }

    #[test]
    fn ensure_valid_joins_problems() {
        let c = Config {
            adjust_step: 0,
            query_timeout_ms: 0,
            ..Config::default()
        };
        let err = ensure_valid(&c).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Config error: "));
        assert!(msg.contains("adjust_step"));
        assert!(msg.contains("; "));
    }
}
