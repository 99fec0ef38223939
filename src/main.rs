// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
mod audio;
mod capture;
mod config;
mod controller;
mod decode;
mod looper;
mod sample;
mod store;
mod util;

use std::error::Error;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use parking_lot::Mutex;
use tracing::info;

use crate::config::Config;
use crate::controller::{keyboard, Controller, Session};
use crate::decode::Decoder;
use crate::looper::{Looper, SharedStore};
use crate::store::CircularSampleStore;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sample looper."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available audio capture devices.
    InputDevices {},
    /// Start will start the looper.
    Start {
        /// The path to the looper config. Defaults are used when omitted.
        config_path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::InputDevices {} => {
            let devices = capture::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Start { config_path } => {
            let config = match config_path {
                Some(config_path) => Config::from_path(config_path)?,
                None => Config::default(),
            };

            let audio_device = audio::get_device(config.audio_device())?;
            let capture_device = capture::get_device(config.capture_device())?;
            info!(
                output = %audio_device,
                input = %capture_device,
                capacity = config.capacity(),
                tempo = %config.tempo(),
                "Looper starting."
            );

            let store: SharedStore =
                Arc::new(Mutex::new(CircularSampleStore::new(config.capacity())));
            let decoder = Decoder::new(audio_device.sample_rate());
            let looper = Arc::new(Looper::new(
                Arc::clone(&store),
                Arc::clone(&audio_device),
                config.tempo(),
            ));
            let session = Session::new(
                store,
                looper,
                capture_device,
                decoder,
                config.capture_window(),
            );

            Controller::new(session, Arc::new(keyboard::Driver::new()))
                .join()
                .await?;
        }
    }

    Ok(())
}
