//! FEBOL: command line driver for the target localization simulator.
//!
//! A drone searches a square domain for a stationary target. Each step it takes a noisy
//! measurement (a bearing or a field-of-view detection), folds it into a belief over the target
//! position with either a grid-based Bayes filter or a particle filter, and moves toward the
//! belief centroid. Runs are described by a configuration file (TOML/JSON/YAML) whose values can
//! be overridden from the command line.

use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::{error, info};

use febol::sim::{FilterType, SensorType, SimulationConfig, run_simulation};

const LONG_ABOUT: &str = "FEBOL: filter-based estimation of a stationary target location.

A simulated drone observes a stationary target with a bearing-only sensor or a binary
field-of-view detector, tracks its belief over the target position with a discrete Bayes
filter or a particle filter, and greedily moves toward the belief centroid until it reaches
the target or runs out of steps.

Use `init-config` to write a configuration template, edit it, then pass it to `run`.";

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "Filter-based localization of a stationary target.", long_about = LONG_ABOUT)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log filter: a level (off, error, warn, info, debug, trace) or RUST_LOG-style directives
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

/// Top-level commands
#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        about = "Run search episodes",
        long_about = "Run one or more seeded search episodes. Settings come from the configuration file when one is given, otherwise from the defaults; command line flags override either."
    )]
    Run(RunArgs),
    #[command(
        name = "init-config",
        about = "Write a configuration template with the default settings"
    )]
    InitConfig(InitConfigArgs),
}

#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// Configuration file (TOML/JSON/YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Belief filter
    #[arg(long, value_enum)]
    filter: Option<FilterType>,

    /// Observation model
    #[arg(long, value_enum)]
    sensor: Option<SensorType>,

    /// Number of episodes
    #[arg(long)]
    episodes: Option<usize>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Write the episode summaries to this JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
struct InitConfigArgs {
    /// Output path; the extension selects the format (.toml/.json/.yaml/.yml)
    path: PathBuf,
}

/// Install the global logger.
///
/// `filters` uses the `RUST_LOG` directive syntax, so both a bare level (`debug`) and per-module
/// levels (`warn,febol::particle=debug`) work. Records carry a millisecond timestamp and their
/// module, and go to stderr unless a log file is given, in which case they are appended to it.
fn init_logger(filters: &str, log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    use std::io::Write;

    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Info);
    builder.parse_filters(filters);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {:<5} {}: {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.module_path().unwrap_or("febol"),
            record.args()
        )
    });

    if let Some(path) = log_file {
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)?,
            _ => {}
        }
        let file = File::options().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    Ok(())
}

fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            SimulationConfig::from_file(path)?
        }
        None => SimulationConfig::default(),
    };
    if let Some(filter) = args.filter {
        config.filter = filter;
    }
    if let Some(sensor) = args.sensor {
        config.sensor = sensor;
    }
    if let Some(episodes) = args.episodes {
        config.episodes = episodes;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate()?;

    let summaries = run_simulation(&config)?;
    let captured = summaries.iter().filter(|s| s.captured).count();
    let mean_steps = if summaries.is_empty() {
        0.0
    } else {
        summaries.iter().map(|s| s.steps as f64).sum::<f64>() / summaries.len() as f64
    };
    info!(
        "Captured the target in {}/{} episode(s), mean steps {:.1}",
        captured,
        summaries.len(),
        mean_steps
    );
    for (i, summary) in summaries.iter().enumerate() {
        println!("episode {}: {}", i, summary);
    }

    if let Some(path) = &args.output {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &summaries)?;
        info!("Wrote episode summaries to {}", path.display());
    }
    Ok(())
}

fn init_config(args: &InitConfigArgs) -> Result<(), Box<dyn Error>> {
    SimulationConfig::default().to_file(&args.path)?;
    info!("Wrote configuration template to {}", args.path.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_file.as_ref())?;

    let result = match &cli.command {
        Command::Run(args) => run(args),
        Command::InitConfig(args) => init_config(args),
    };
    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}
