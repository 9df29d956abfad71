//! `serve` subcommand — run the web interface until Ctrl+C.

use std::sync::Arc;

use super::{Config, Result, color::Rgb};
use crate::server::{self, AppState, Cooldown};

pub(super) async fn cmd_serve(config: Config) -> Result<()> {
    let addr = config.listen_addr()?;
    let (blaster, task) = super::start_blaster(&config).await?;
    blaster.set_color(Rgb::BLACK).await?;
    log::info!(
        "light ready on pins r={} g={} b={}",
        config.pins.red,
        config.pins.green,
        config.pins.blue
    );

    let state = AppState {
        blaster,
        static_dir: config.static_dir.clone(),
        adjust_step: config.adjust_step,
        adjust: config.adjust,
        cooldown: Arc::new(Cooldown::new(config.cooldown())),
    };
    server::serve(addr, state).await?;

    // The router held the last handle; the actor drains and exits.
    if let Err(e) = task.await {
        log::warn!("light controller task ended abnormally: {e}");
    }
    log::info!("stopped");
    Ok(())
}
