use std::{error::Error, path::PathBuf, sync::Arc, time::Duration};

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::{
    bluetooth::central::BtleCentral,
    config::{path::get_registry_path, ConfigStore},
    constants::{DEFAULT_HID_DEVICE, DEFAULT_SERIAL_DEVICE, TYPING_DELAY},
    daemon,
    drivers::openarcade::driver::DEVICE_NAME,
    input::{
        keycode::KeycodeTable,
        pipeline::{Pipeline, PipelineOptions},
        target::{keyboard::KeyboardDevice, typing::type_text},
    },
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Commands>,
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Bridge controllers to the HID gadget (default)
    Run(RunArgs),
    /// Serve configuration requests over the USB serial gadget
    ConfigDaemon {
        /// Serial gadget device path
        #[arg(long, default_value = DEFAULT_SERIAL_DEVICE)]
        device: PathBuf,
        /// Log every request and response
        #[arg(long)]
        verbose: bool,
        /// Path to the device registry
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Type text through the HID gadget
    Type {
        /// Text to type
        text: String,
        /// HID gadget device path
        #[arg(long, default_value = DEFAULT_HID_DEVICE)]
        hid_device: PathBuf,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Path to the device registry
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// HID gadget device path
    #[arg(long, default_value = DEFAULT_HID_DEVICE)]
    pub hid_device: PathBuf,
    /// Advertised name of the controllers to connect to
    #[arg(long, default_value = DEVICE_NAME)]
    pub device_name: String,
}

impl From<RunArgs> for PipelineOptions {
    fn from(args: RunArgs) -> Self {
        Self {
            config_path: args.config.unwrap_or_else(get_registry_path),
            hid_device: args.hid_device,
            device_name: args.device_name,
            ..Default::default()
        }
    }
}

pub async fn main_cli(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.cmd {
        None => run_bridge(args.run).await,
        Some(Commands::Run(run)) => run_bridge(run).await,
        Some(Commands::ConfigDaemon {
            device,
            verbose,
            config,
        }) => {
            let store = ConfigStore::new(config.unwrap_or_else(get_registry_path));
            daemon::run(device, &store, verbose).await
        }
        Some(Commands::Type { text, hid_device }) => {
            let keycodes = Arc::new(KeycodeTable::new());
            let mut device = KeyboardDevice::open(hid_device, keycodes.clone());
            let typed = type_text(&mut device, &keycodes, &text, TYPING_DELAY).await?;
            log::info!("Typed {typed} character(s)");
            Ok(())
        }
    }
}

/// Run the bridge until CTRL+C or until every stage has exited
async fn run_bridge(args: RunArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let pipeline = Pipeline::start(args.into(), BtleCentral::new)?;

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                log::info!("Shutting down");
                break;
            }
            _ = interval.tick() => {
                if !pipeline.is_running() {
                    log::warn!("All stages have exited");
                    break;
                }
            }
        }
    }

    tokio::task::spawn_blocking(move || pipeline.stop()).await?;

    Ok(())
}
