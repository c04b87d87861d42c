//! Radipower command line tool
//!
//! Finds Radipower RF power heads on the serial ports, assigns each one its
//! channel, and reads or configures them all in one go.

mod bench;
mod commands;
mod settings;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use radipower_protocol::{AveragingPolicy, FilterSetting, VbwSetting};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

#[derive(Parser, Debug)]
#[command(version, about = "Find, read and configure Radipower RF power heads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file [default: <config dir>/radipower/settings.json]
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Try only this port (repeatable) instead of scanning
    #[arg(short, long = "port", global = true, value_name = "PORT")]
    ports: Vec<String>,

    /// Use N simulated heads instead of serial ports
    #[arg(long, global = true, value_name = "N")]
    simulate: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the heads found, by channel
    Scan {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Read power from every head
    Read {
        /// Readings per head
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
        /// Also read each head's temperature
        #[arg(long)]
        temperature: bool,
    },
    /// Apply settings to every head
    Configure(ConfigureArgs),
    /// Show the effective settings
    Settings {
        /// Write them to the settings file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args, Debug)]
struct ConfigureArgs {
    /// Calibration frequency in Hz
    #[arg(short, long, value_name = "HZ")]
    frequency: Option<u64>,

    /// Filter code 1..7 or AUTO
    #[arg(long, conflicts_with = "averages")]
    filter: Option<FilterSetting>,

    /// Target samples per reading; the filter code is chosen by --policy
    #[arg(short, long, value_name = "SAMPLES")]
    averages: Option<u32>,

    /// no-smear, min-rms, closest or most
    #[arg(long, default_value = "closest", requires = "averages")]
    policy: AveragingPolicy,

    /// Acquisition speed in kS/s
    #[arg(long, value_name = "KSPS")]
    acq_speed: Option<u16>,

    /// Video bandwidth code 0..3 or AUTO
    #[arg(long)]
    vbw: Option<VbwSetting>,

    /// Head bit rate in bits per second
    #[arg(long, value_name = "BPS")]
    baud: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "radipower=info,radipower_protocol=info,radipower_head=info,radipower_detect=info,radipower_sim=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    if let Commands::Settings { save } = &cli.command {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        if *save {
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => Settings::default_path().context("No config directory available")?,
            };
            settings.save(&path)?;
            tracing::info!("Settings written to {}", path.display());
        }
        return Ok(());
    }

    let table = settings.id_table()?;

    match cli.simulate {
        Some(n) => {
            let found = bench::simulated(n, &table, &settings).await?;
            commands::run(&cli.command, found).await
        }
        None => {
            let found = bench::serial(&cli.ports, &table, &settings).await?;
            commands::run(&cli.command, found).await
        }
    }
}
