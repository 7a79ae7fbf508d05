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
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use ash_control::app::App;
use ash_control::config::Config;
use ash_control::midi;
use ash_control::preset::preset_path;
use ash_control::wavetable::preview::Preview;
use clap::{crate_version, Parser, Subcommand, ValueEnum};
use duration_string::DurationString;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

/// How long to keep listening once the device has started its settings dump.
const SETTLE_TIME: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A control surface for the Ascetik Ash synthesizer."
)]
struct Cli {
    /// The path to a YAML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the Ascetik MIDI inputs.
    Devices {},
    /// Prints device traffic until interrupted.
    Monitor {},
    /// Sets a device parameter.
    Set {
        /// The parameter to set.
        parameter: Parameter,
        /// The new value. Out of range values are clamped.
        value: i32,
    },
    /// Maps one of the 13 CC slots to a controller number.
    CcMap {
        /// The slot, 0-12.
        index: i32,
        /// The controller number, 0-127.
        value: i32,
    },
    /// Sends a control change.
    Cc {
        /// The controller number.
        controller: i32,
        /// The value.
        value: i32,
        /// The MIDI channel, 1-16.
        #[arg(short = 'n', long)]
        channel: Option<i32>,
    },
    /// Tells the device to store its current settings.
    Store {},
    /// Prints the device identification and settings.
    Info {
        /// How long to wait for the device to answer.
        #[arg(short, long, default_value = "2s")]
        wait: String,
    },
    /// Converts an audio file into a wavetable and prints it.
    Convert {
        /// The audio file.
        path: PathBuf,
    },
    /// Plays a converted audio file as a looping wavetable.
    Preview {
        /// The audio file.
        path: PathBuf,
        /// How long to play for.
        #[arg(short, long, default_value = "5s")]
        duration: String,
    },
    /// Converts an audio file and sends it to the device.
    SendWavetable {
        /// The audio file.
        path: PathBuf,
        /// The table slot, 0-2.
        #[arg(short, long, default_value_t = 0)]
        table: i32,
    },
    /// Saves or loads presets.
    Preset {
        #[clap(subcommand)]
        command: PresetCommands,
    },
}

#[derive(Subcommand)]
enum PresetCommands {
    /// Saves the device's current settings to a JSON file.
    Save {
        /// The preset name or path. ".json" is appended if missing.
        name: Option<String>,
        /// How long to wait for the device to report its settings.
        #[arg(short, long, default_value = "2s")]
        wait: String,
    },
    /// Loads a JSON preset and sends it to the device.
    Load {
        /// The preset file.
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Parameter {
    Velocity,
    Channel,
    Thru,
    DelayFeedback,
    DelayMix,
    FilterResonance,
    DeviceMode,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::deserialize(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Devices {} => {
            let app = App::new(midi::platform(), &config, false)?;
            let ports = app.session().candidates()?;

            if ports.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            let preferred = app.session().preferred(&ports).map(|port| port.id().to_string());
            println!("Devices:");
            for port in ports.iter() {
                if preferred.as_deref() == Some(port.id()) {
                    println!("- {} (preferred)", port);
                } else {
                    println!("- {}", port);
                }
            }
        }
        Commands::Monitor {} => {
            let mut app = App::new(midi::platform(), &config, true)?;
            app.start();
            app.run().await;
        }
        Commands::Set { parameter, value } => {
            let app = connect(&config)?;
            let session = app.session();
            match parameter {
                Parameter::Velocity => session.set_velocity(value),
                Parameter::Channel => session.set_midi_channel(value),
                Parameter::Thru => session.set_midi_thru(value != 0),
                Parameter::DelayFeedback => session.set_delay_feedback(value),
                Parameter::DelayMix => session.set_delay_mix(value),
                Parameter::FilterResonance => session.set_filter_resonance(value),
                Parameter::DeviceMode => session.set_device_mode(value),
            }
        }
        Commands::CcMap { index, value } => {
            connect(&config)?.session().set_cc_mapping(index, value);
        }
        Commands::Cc {
            controller,
            value,
            channel,
        } => {
            connect(&config)?.session().send_cc(controller, value, channel);
        }
        Commands::Store {} => {
            connect(&config)?.session().store_settings();
        }
        Commands::Info { wait } => {
            let mut app = connect(&config)?;
            wait_for_settings(&mut app, parse_duration(wait)?).await;

            match app.surface().device_info() {
                Some(info) => println!("Device: {}", info),
                None => println!("The device did not identify itself."),
            }
            if app.surface().settings_received() {
                println!("{}", app.surface().settings());
            }
        }
        Commands::Convert { path } => {
            let app = App::new(midi::platform(), &config, true)?;
            let wavetable = app.load_wavetable(&path)?;
            for row in wavetable.samples().chunks(16) {
                println!(
                    "{}",
                    row.iter()
                        .map(|sample| format!("{:4}", sample))
                        .collect::<Vec<String>>()
                        .join(" ")
                );
            }
        }
        Commands::Preview { path, duration } => {
            let app = App::new(midi::platform(), &config, true)?;
            let wavetable = app.load_wavetable(&path)?;
            let preview = config.preview();
            let _playing = Preview::play(&wavetable, preview.pitch_hz(), preview.gain())?;
            tokio::time::sleep(parse_duration(duration)?).await;
        }
        Commands::SendWavetable { path, table } => {
            let mut app = connect(&config)?;
            let wavetable = app.load_wavetable(&path)?;
            if !app.send_wavetable(table, &wavetable).await {
                return Err("wavetable send failed".into());
            }
        }
        Commands::Preset { command } => match command {
            PresetCommands::Save { name, wait } => {
                let mut app = connect(&config)?;
                if !wait_for_settings(&mut app, parse_duration(wait)?).await {
                    return Err("the device did not report its settings".into());
                }
                let path = preset_path(name.as_deref());
                app.save_preset(&path)?;
                println!("Saved {}", path.display());
            }
            PresetCommands::Load { path } => {
                connect(&config)?.load_preset(&path)?;
            }
        },
    }

    Ok(())
}

/// Starts the app and makes sure a device output is bound.
fn connect(config: &Config) -> Result<App, Box<dyn Error>> {
    let mut app = App::new(midi::platform(), config, true)?;
    app.start();
    if app.session().output().is_none() {
        return Err(format!("no {} device connected", config.device_name()).into());
    }
    Ok(app)
}

/// Listens until the device has identified itself and started reporting its
/// settings, or the wait runs out. Returns whether settings were received.
async fn wait_for_settings(app: &mut App, wait: Duration) -> bool {
    let deadline = Instant::now() + wait;
    let started = app
        .run_until(Some(deadline), |surface| {
            surface.device_info().is_some() && surface.settings_received()
        })
        .await;
    if started {
        app.run_for(SETTLE_TIME).await;
    }
    app.surface().settings_received()
}

fn parse_duration(duration: String) -> Result<Duration, Box<dyn Error>> {
    Ok(DurationString::from_string(duration)?.into())
}
