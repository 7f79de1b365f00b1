//! Command-line front end for the linear acceleration engine.
//!
//! `gyroaccel replay` feeds a recorded capture file through a fresh engine
//! and prints every notification as one JSON object per line, which makes
//! sessions recorded on a device reproducible on a workstation.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use gyroaccel::capture::read_capture;
use gyroaccel::{
    ChannelSink, Clock, EngineConfig, ManualClock, MonotonicClock, Notification, SamplingEngine,
    StaticSensorHost,
};

const NANOS_PER_MILLI: i64 = 1_000_000;

#[derive(Debug, Parser)]
#[command(name = "gyroaccel")]
#[command(about = "Gyroscope-stabilized linear acceleration engine")]
struct Cli {
    /// Log level written to stderr (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: log::LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a capture file and print the resulting notifications
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
struct ReplayArgs {
    /// Capture file with `timestamp,label,x,y,z` lines
    file: PathBuf,

    /// Engine configuration in TOML
    #[arg(long)]
    config: Option<PathBuf>,

    /// Throttle diffs by wall-clock time instead of sample timestamps
    #[arg(long, default_value_t = false)]
    wall_clock: bool,
}

fn setup_logger(level: log::LevelFilter) -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(io::stderr())
        .apply()?;
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    // A replay never records a new capture of itself
    if config.capture_path.take().is_some() {
        log::info!("Ignoring capture_path during replay");
    }
    Ok(config)
}

fn print_events(rx: &mpsc::Receiver<Notification>, out: &mut impl Write) -> Result<()> {
    for event in rx.try_iter() {
        writeln!(out, "{}", serde_json::to_string(&event)?)?;
    }
    Ok(())
}

fn replay(args: &ReplayArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let samples = read_capture(&args.file)
        .with_context(|| format!("reading capture {}", args.file.display()))?;
    log::info!("Replaying {} samples from {}", samples.len(), args.file.display());

    let manual = ManualClock::new(0);
    let clock: Box<dyn Clock> = if args.wall_clock {
        Box::new(MonotonicClock::new())
    } else {
        Box::new(manual.clone())
    };

    let (tx, rx) = mpsc::channel();
    let mut engine = SamplingEngine::with_clock(config, Box::new(StaticSensorHost::complete()), clock)?;
    engine.set_sink(Box::new(ChannelSink::new(tx)));

    let stdout = io::stdout();
    let mut out = stdout.lock();

    engine.start();
    print_events(&rx, &mut out)?;
    for sample in &samples {
        let now_ms = u64::try_from(sample.timestamp_ns / NANOS_PER_MILLI).unwrap_or(0);
        manual.set_ms(now_ms);
        engine.on_sample(sample);
        print_events(&rx, &mut out)?;
    }

    let gravity = engine.gravity();
    let count = engine.sample_count();
    engine.stop();
    print_events(&rx, &mut out)?;
    out.flush()?;

    match gravity {
        Some(g) => log::info!(
            "Replay finished after {} samples, gravity: x: {}; y: {}; z: {}",
            count,
            g.vector.x,
            g.vector.y,
            g.vector.z
        ),
        None => log::warn!("Replay finished after {} samples without completing calibration", count),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logger(cli.log_level)?;

    match cli.command {
        Commands::Replay(args) => replay(&args),
    }
}
