//! Headless front end for the clipper engine.
//!
//! Usage:
//!   clipper record --seconds 5 --out take.wav
//!   clipper play take.wav --start 1.5
//!   clipper edit take.wav out.wav --trim 0.5 2.0 --gain-db -3
//!   clipper devices

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use clipper_engine::codec::{AudioCodec, ExportFormat, WavCodec};
use clipper_engine::editor;
use clipper_engine::{AudioBackend, ClipperSession, CpalBackend};
use clipper_shared::ClipperConfig;
use log::{info, warn};

#[derive(Parser)]
#[command(name = "clipper", about = "Record, play and cut audio clips")]
struct Cli {
    /// JSON settings file (defaults are used for anything missing)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record from the default input device
    Record {
        /// Length of the take
        #[arg(short, long, default_value_t = 5.0)]
        seconds: f64,
        /// Output file (.wav)
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long)]
        rate: Option<u32>,
        #[arg(long)]
        channels: Option<u16>,
    },
    /// Play a file on the default output device
    Play {
        file: PathBuf,
        /// Start offset in seconds
        #[arg(short, long, default_value_t = 0.0)]
        start: f64,
    },
    /// Apply edits to a file and write the result
    Edit {
        input: PathBuf,
        output: PathBuf,
        /// Keep only START..END seconds
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        trim: Option<Vec<f64>>,
        /// Cut START..END seconds out
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        remove: Option<Vec<f64>>,
        /// Gain applied after trim/remove
        #[arg(short, long, allow_hyphen_values = true)]
        gain_db: Option<f64>,
    },
    /// List audio devices
    Devices,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ClipperConfig::load_or_default(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => ClipperConfig::default(),
    };

    match cli.command {
        Commands::Record { seconds, out, rate, channels } => record(config, seconds, &out, rate, channels),
        Commands::Play { file, start } => play(config, &file, start),
        Commands::Edit { input, output, trim, remove, gain_db } => {
            edit(&config, &input, &output, region(trim)?, region(remove)?, gain_db)
        }
        Commands::Devices => devices(),
    }
}

fn region(values: Option<Vec<f64>>) -> Result<Option<(f64, f64)>> {
    match values.as_deref() {
        None => Ok(None),
        Some([start, end]) => Ok(Some((*start, *end))),
        Some(_) => bail!("a region needs exactly START and END"),
    }
}

fn export_format(path: &Path) -> ExportFormat {
    ExportFormat::from_path(path).unwrap_or(ExportFormat::Wav)
}

fn open_session(config: ClipperConfig) -> ClipperSession {
    let codec = WavCodec::new(config.export.bit_depth);
    ClipperSession::new(Arc::new(CpalBackend::new()), Box::new(codec), config)
}

fn record(mut config: ClipperConfig, seconds: f64, out: &Path, rate: Option<u32>, channels: Option<u16>) -> Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("--seconds must be positive");
    }
    if let Some(rate) = rate {
        config.capture.sample_rate = rate;
    }
    if let Some(channels) = channels {
        config.capture.channels = channels;
    }

    let mut session = open_session(config);
    if !session.toggle_recording() {
        bail!("{}", session.status().text);
    }

    let deadline = Instant::now() + Duration::from_secs_f64(seconds);
    while Instant::now() < deadline {
        thread::sleep(Duration::from_millis(250));
        info!("[Record] {:.1}s", session.recorded_seconds());
    }
    session.toggle_recording();

    if session.buffer().is_empty() {
        bail!("{}", session.status().text);
    }
    session
        .save(out, export_format(out))
        .with_context(|| format!("Failed to save {}", out.display()))?;
    println!("{}", session.status().text);
    Ok(())
}

fn play(config: ClipperConfig, file: &Path, start: f64) -> Result<()> {
    let mut session = open_session(config);
    session
        .load(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;

    session.seek(start);
    if !session.toggle_playback() {
        bail!("{}", session.status().text);
    }
    info!("[Play] {} ({:.2}s)", file.display(), session.duration());

    while session.is_playing() {
        session.wait_for_events(Duration::from_millis(100));
    }
    session.stop_playback();
    Ok(())
}

fn edit(
    config: &ClipperConfig,
    input: &Path,
    output: &Path,
    trim: Option<(f64, f64)>,
    remove: Option<(f64, f64)>,
    gain_db: Option<f64>,
) -> Result<()> {
    let codec = WavCodec::new(config.export.bit_depth);
    let mut buffer = codec
        .load(input)
        .with_context(|| format!("Failed to load {}", input.display()))?;

    if let Some((start, end)) = trim {
        let outcome = editor::trim_to_region(&buffer, start, end);
        if !outcome.is_changed() {
            warn!("[Edit] Trim {:.3}..{:.3} changed nothing", start, end);
        }
        buffer = outcome.into_buffer();
    }
    if let Some((start, end)) = remove {
        let outcome = editor::remove_region(&buffer, start, end);
        if !outcome.is_changed() {
            warn!("[Edit] Remove {:.3}..{:.3} changed nothing", start, end);
        }
        buffer = outcome.into_buffer();
    }
    if let Some(gain_db) = gain_db {
        buffer = editor::adjust_volume(&buffer, gain_db).into_buffer();
    }

    if buffer.is_empty() {
        bail!("edits left no audio");
    }
    codec
        .save(output, &buffer, export_format(output))
        .with_context(|| format!("Failed to save {}", output.display()))?;
    println!("{} ({:.2}s)", output.display(), buffer.duration_seconds());
    Ok(())
}

fn devices() -> Result<()> {
    let backend = CpalBackend::new();
    println!("Inputs:");
    for name in backend.input_device_names().context("Failed to list input devices")? {
        println!("  {}", name);
    }
    println!("Outputs:");
    for name in backend.output_device_names().context("Failed to list output devices")? {
        println!("  {}", name);
    }
    Ok(())
}
