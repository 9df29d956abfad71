//! `set` / `off` subcommands — one color change, then exit.

use super::{Config, Result, color::Rgb};

pub(super) async fn cmd_set(config: Config, color: Rgb) -> Result<()> {
    let (blaster, _task) = super::start_blaster(&config).await?;
    blaster.set_color(color).await?;
    let reported = blaster.current_color().await?;
    println!("{reported}");
    Ok(())
}
