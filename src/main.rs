use std::env;
use std::error::Error;

use clap::Parser;

use crate::cli::{main_cli, Args, Commands};

mod bluetooth;
mod cli;
mod config;
mod constants;
mod daemon;
mod drivers;
mod input;
mod sync;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let log_level = match env::var("LOG_LEVEL") {
        Ok(value) => value,
        Err(_) => "info".to_string(),
    };
    env::set_var("RUST_LOG", log_level);
    env_logger::init();

    let args = Args::parse();
    if matches!(args.cmd, None | Some(Commands::Run(_))) {
        const VERSION: &str = env!("CARGO_PKG_VERSION");
        log::info!("Starting OpenArcade v{}", VERSION);
    }

    // Errors exit with status 1
    if let Err(e) = main_cli(args).await {
        log::error!("{e}");
        return Err(e);
    }

    log::info!("OpenArcade stopped");

    Ok(())
}
