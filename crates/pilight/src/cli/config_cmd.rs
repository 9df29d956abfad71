//! `config` subcommand — show the effective configuration and its file path.

use std::path::Path;

use super::{Config, ConfigOutput, PilightError, Result, kv, kv_indent, kv_width};

pub(super) fn cmd_config(config: &Config, custom_path: Option<&Path>, json: bool) -> Result<()> {
    let config_path = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let problems: Vec<String> = match config.validate() {
        Ok(()) => vec![],
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    };

    if json {
        let output = ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config.clone(),
            problems,
        };
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| PilightError::Io(std::io::Error::other(e)))?;
        println!("{text}");
        return Ok(());
    }

    let w = kv_width(
        &["Config file:"],
        &[
            "device_path:",
            "daemon_command:",
            "listen:",
            "static_dir:",
            "cooldown_ms:",
            "query_timeout_ms:",
            "transform:",
            "store:",
            "adjust_step:",
            "adjust:",
            "pins:",
            "correction:",
        ],
    );

    match &config_path {
        Some(p) if config_exists => kv("Config file:", format_args!("{} (loaded)", p.display()), w),
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    kv_indent("device_path:", config.device_path.display(), w);
    kv_indent("daemon_command:", &config.daemon_command, w);
    kv_indent("listen:", &config.listen, w);
    kv_indent("static_dir:", config.static_dir.display(), w);
    kv_indent("cooldown_ms:", config.cooldown_ms, w);
    kv_indent("query_timeout_ms:", config.query_timeout_ms, w);
    kv_indent("transform:", format_args!("{:?}", config.transform), w);
    kv_indent("store:", format_args!("{:?}", config.store), w);
    kv_indent("adjust_step:", config.adjust_step, w);
    kv_indent("adjust:", format_args!("{:?}", config.adjust), w);
    let p = &config.pins;
    kv_indent(
        "pins:",
        format_args!("red={} green={} blue={}", p.red, p.green, p.blue),
        w,
    );
    let c = &config.correction;
    kv_indent(
        "correction:",
        format_args!("red={} green={} blue={}", c.red, c.green, c.blue),
        w,
    );

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for problem in &problems {
            println!("  {problem}");
        }
    }
    Ok(())
}
