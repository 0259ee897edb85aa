//! dinowalk CLI - replay recorded sensor traces through the walking pipeline
//!
//! Usage:
//!   dinowalk replay <trace.json> [--config <file>] [--sensitivity <n>] [--dino <name>]
//!   dinowalk config
//!
//! A trace is a JSON array of sensor events (positions, accelerometer
//! samples, sensor failures). The replay runs a full session over it and
//! prints the resulting summary.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{debug, error, info};

use dinowalk::{
    geo, ConfigError, Dinosaur, DinoWalkError, ManualClock, MemorySink, ReplaySource, Result,
    SensorEvent, SensorSource, SessionPipeline, SessionSummary, WalkConfig,
};

#[derive(Parser)]
#[command(name = "dinowalk")]
#[command(
    about = "Replay sensor traces through the DinoWalk step and distance pipeline",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one walking session over a recorded trace
    Replay {
        /// JSON file containing an array of sensor events
        trace: PathBuf,

        /// JSON configuration file (defaults apply to anything omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the step detection sensitivity
        #[arg(short, long)]
        sensitivity: Option<f32>,

        /// Name of the dinosaur that receives the experience
        #[arg(long, default_value = "Rex")]
        dino: String,
    },

    /// Print the default configuration as JSON
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let outcome = match cli.command {
        Commands::Replay {
            trace,
            config,
            sensitivity,
            dino,
        } => run_replay(&trace, config.as_deref(), sensitivity, &dino),
        Commands::Config => print_default_config(),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn print_default_config() -> Result<()> {
    let json = serde_json::to_string_pretty(&WalkConfig::default()).map_err(ConfigError::from)?;
    println!("{}", json);
    Ok(())
}

fn load_config(path: Option<&Path>, sensitivity: Option<f32>) -> Result<WalkConfig> {
    let mut config = match path {
        Some(path) => WalkConfig::from_file(path)?,
        None => WalkConfig::default(),
    };
    if let Some(sensitivity) = sensitivity {
        config.step.sensitivity = sensitivity;
        config.validate()?;
    }
    Ok(config)
}

fn load_trace(path: &Path) -> Result<Vec<SensorEvent>> {
    let text = fs::read_to_string(path)?;
    let events: Vec<SensorEvent> = serde_json::from_str(&text).map_err(ConfigError::from)?;
    info!("loaded {} events from {}", events.len(), path.display());
    Ok(events)
}

fn event_time(event: &SensorEvent) -> Option<u64> {
    match event {
        SensorEvent::Position(fix) => fix.position.timestamp_ms,
        SensorEvent::Acceleration(sample) => Some(sample.timestamp_ms),
        _ => None,
    }
}

fn run_replay(
    trace: &Path,
    config_path: Option<&Path>,
    sensitivity: Option<f32>,
    dino_name: &str,
) -> Result<()> {
    let config = load_config(config_path, sensitivity)?;
    let events = load_trace(trace)?;

    // Session time follows the trace, not the wall clock
    let first = events.iter().find_map(event_time).unwrap_or(0);
    let last = events.iter().filter_map(event_time).max().unwrap_or(first);
    let clock = ManualClock::new(first);

    let sink = MemorySink::new();
    let (pipeline, handle) = SessionPipeline::new(config, Box::new(sink.clone()));
    let mut pipeline = pipeline.with_clock(Arc::new(clock.clone()));

    // One source per feed, so losing one feed never cuts off the other
    let mut replays = Vec::new();
    for (source, done) in ReplaySource::per_feed(events) {
        replays.push((source.kind(), done));
        pipeline = pipeline.with_source(Box::new(source));
    }
    let worker = pipeline.spawn()?;

    handle.start()?;
    for (kind, done) in replays {
        let sent = done.recv().map_err(|_| DinoWalkError::PipelineClosed)?;
        debug!("{:?} replay delivered {} events", kind, sent);
    }

    // Every replayed event is queued ahead of this request
    let snapshot = handle.snapshot()?;
    debug!(
        "sensor status: geolocation {:?}, motion {:?}",
        snapshot.geolocation_status, snapshot.motion_status
    );

    clock.set(last);
    handle.stop()?;
    handle.shutdown()?;
    worker.join().map_err(|_| DinoWalkError::PipelineClosed)?;

    let summary = sink
        .sessions()
        .pop()
        .ok_or(DinoWalkError::SessionNotActive)?;
    print_summary(&summary, dino_name)
}

fn print_summary(summary: &SessionSummary, dino_name: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).map_err(ConfigError::from)?;
    println!("{}", json);

    println!("\n{}", "=".repeat(40));
    println!("Steps:     {}", summary.steps);
    println!("Distance:  {}", geo::format_distance(summary.distance_m));
    println!("Speed:     {}", geo::format_speed(summary.final_speed_mps));
    println!(
        "Average:   {}",
        geo::format_speed(summary.average_speed_mps())
    );
    println!("Duration:  {}s", summary.elapsed_ms / 1000);

    let mut dinosaur = Dinosaur::new(dino_name);
    let gain = dinosaur.gain_experience(summary.experience_gained);
    println!(
        "{} gained {} xp: level {} ({:.0}% to next)",
        dinosaur.name,
        gain.gained,
        dinosaur.level,
        dinosaur.level_progress_percent()
    );
    if gain.leveled_up() {
        println!("{} leveled up!", dinosaur.name);
    }
    Ok(())
}
