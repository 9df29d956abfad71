//! pilight — HTTP-controlled RGB light for pi-blaster.

use std::path::PathBuf;

use clap::Parser;

mod cli;
mod server;

#[derive(Parser)]
#[command(
    name = "pilight",
    version,
    about = "HTTP-controlled RGB light for pi-blaster"
)]
struct Args {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Red GPIO pin
    #[arg(short = 'r', long = "red-pin", global = true)]
    red: Option<u8>,

    /// Green GPIO pin
    #[arg(short = 'g', long = "green-pin", global = true)]
    green: Option<u8>,

    /// Blue GPIO pin
    #[arg(short = 'b', long = "blue-pin", global = true)]
    blue: Option<u8>,

    /// Milliseconds cooldown between color changes
    #[arg(long, global = true)]
    cooldown: Option<u64>,

    #[command(subcommand)]
    command: Option<cli::Command>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_target(false)
        .init();

    let overrides = cli::Overrides {
        red: args.red,
        green: args.green,
        blue: args.blue,
        cooldown_ms: args.cooldown,
    };
    let config = cli::load_config(args.config.as_deref(), &overrides);
    let command = args.command.unwrap_or(cli::Command::Serve);

    if let Err(e) = cli::run(command, config, args.config.as_deref()).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
