//! eqchain CLI Application

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use eqchain_core::domain::{
    frequency_response, gain_to_db, log_frequencies, AudioProcessor, ConfigManager, EqConfig,
    EqProcessor, ParameterKind, ParameterStore,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eqchain")]
#[command(about = "A three-band parametric equalizer engine", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the parameter layout
    Params,

    /// Print the magnitude response of the configured EQ
    Response {
        /// Number of log-spaced points between 20 Hz and 20 kHz
        #[arg(long, default_value_t = 31)]
        points: usize,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Stream a test tone through the engine and report the gain
    Probe {
        /// Tone frequency in Hz
        #[arg(long, default_value_t = 1000.0)]
        frequency: f64,

        /// Peak amplitude of the tone
        #[arg(long, default_value_t = 0.5)]
        amplitude: f32,

        /// Tone length in seconds
        #[arg(long, default_value_t = 1.0)]
        seconds: f64,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct ResponsePoint {
    frequency_hz: f64,
    magnitude_db: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => EqConfig::default_path()?,
    };
    let manager = ConfigManager::new(config_path);

    match cli.command {
        Command::Params => print_params(),
        Command::Response { points, json } => {
            let config = manager.load().await;
            print_response(&config, points, json)?;
        }
        Command::Probe {
            frequency,
            amplitude,
            seconds,
        } => {
            let config = manager.load().await;
            probe(&config, frequency, amplitude, seconds)?;
        }
        Command::Init { force } => {
            if manager.exists() && !force {
                bail!(
                    "{} already exists, pass --force to overwrite",
                    manager.config_path().display()
                );
            }
            manager
                .save(&EqConfig::default())
                .await
                .context("failed to write default configuration")?;
            println!("Wrote {}", manager.config_path().display());
        }
    }

    Ok(())
}

fn print_params() {
    println!(
        "{:<14} {:>10} {:>10} {:>8} {:>12}",
        "NAME", "MIN", "MAX", "STEP", "DEFAULT"
    );
    for info in ParameterStore::layout() {
        println!(
            "{:<14} {:>10} {:>10} {:>8} {:>12}",
            info.name,
            info.display(info.min),
            info.display(info.max),
            info.step,
            info.display(info.default)
        );
        if let (ParameterKind::Choice, Some(choices)) = (info.kind, info.choices()) {
            println!("{:<14} choices: {}", "", choices.join(", "));
        }
    }
}

fn print_response(config: &EqConfig, points: usize, json: bool) -> anyhow::Result<()> {
    let spec = config.engine.to_process_spec()?;
    let settings = config.settings.to_settings()?;

    let freqs = log_frequencies(20.0, 20000.0f64.min(spec.nyquist()), points);
    let response = frequency_response(&settings, spec.sample_rate, &freqs);

    if json {
        let points: Vec<ResponsePoint> = freqs
            .iter()
            .zip(&response)
            .map(|(&frequency_hz, &magnitude_db)| ResponsePoint {
                frequency_hz,
                magnitude_db,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&points)?);
    } else {
        println!("{:>10} {:>10}", "Hz", "dB");
        for (freq, db) in freqs.iter().zip(&response) {
            println!("{freq:>10.1} {db:>10.2}");
        }
    }
    Ok(())
}

fn probe(config: &EqConfig, frequency: f64, amplitude: f32, seconds: f64) -> anyhow::Result<()> {
    check_probe_args(frequency, amplitude, seconds)?;
    let spec = config.engine.to_process_spec()?;
    let settings = config.settings.to_settings()?;

    let parameters = Arc::new(ParameterStore::with_settings(&settings));
    let mut processor = EqProcessor::new(parameters);
    processor.prepare(spec)?;

    let total = (seconds * spec.sample_rate) as usize;
    // First tenth of the tone is excluded from the measurement while filters settle
    let settle = total / 10;
    let num_channels = spec.channels.count();
    let mut buffers = vec![vec![0.0f32; spec.max_block_size]; num_channels];

    let mut input_energy = 0.0f64;
    let mut output_energy = 0.0f64;
    let mut measured = 0usize;
    let mut position = 0;

    while position < total {
        let len = spec.max_block_size.min(total - position);
        for buffer in buffers.iter_mut() {
            for (i, sample) in buffer[..len].iter_mut().enumerate() {
                let t = (position + i) as f64 / spec.sample_rate;
                *sample = amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin() as f32;
            }
        }
        if position >= settle {
            input_energy += energy(&buffers[0][..len]);
        }

        {
            let mut channels: Vec<&mut [f32]> =
                buffers.iter_mut().map(|b| &mut b[..len]).collect();
            processor.process_block_from_store(&mut channels);
        }

        if position >= settle {
            output_energy += energy(&buffers[0][..len]);
            measured += len;
        }
        position += len;
    }
    processor.release();

    let measured = measured.max(1);
    let input_rms = (input_energy / measured as f64).sqrt();
    let output_rms = (output_energy / measured as f64).sqrt();

    println!("tone:       {frequency:.1} Hz at {:.0} Hz sample rate", spec.sample_rate);
    println!("input rms:  {input_rms:.6}");
    println!("output rms: {output_rms:.6}");
    if input_rms > 0.0 {
        println!("gain:       {:.2} dB", gain_to_db(output_rms / input_rms));
    }
    Ok(())
}

fn check_probe_args(frequency: f64, amplitude: f32, seconds: f64) -> anyhow::Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("--seconds must be a positive number, got {seconds}");
    }
    if !frequency.is_finite() || frequency <= 0.0 {
        bail!("--frequency must be a positive number of Hz, got {frequency}");
    }
    if !amplitude.is_finite() {
        bail!("--amplitude must be finite, got {amplitude}");
    }
    Ok(())
}

fn energy(block: &[f32]) -> f64 {
    block.iter().map(|&s| f64::from(s) * f64::from(s)).sum()
}
