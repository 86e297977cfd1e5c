//! # scanpoolctl
//!
//! Command line front end for the scanpool decode scheduler.
//!
//! - `decode`: run image files through a pool of QR decoders
//! - `bench`: measure how a pool configuration admits a synthetic frame stream
//! - `config show`: print the effective configuration

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use scanpool_core::{FaultPolicy, ScanPoolConfig};
use scanpoolctl::{
    ConfigLoad, ConfigLoader,
    bench::{self, BenchOptions},
    config::{duration_to_ms, parse_fault_policy, render_toml},
    decode::{self, DecodeOptions, FileOutcome},
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "scanpoolctl", version)]
#[command(about = "Load-balanced QR decoding over a fixed pool of decoders")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    pool: PoolArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct PoolArgs {
    /// Path to a scanpool.toml (defaults to ./scanpool.toml or ./config/scanpool.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to a .env file to load before reading SCANPOOL_* variables
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Number of decoder slots (overrides config)
    #[arg(long, global = true)]
    pool_size: Option<usize>,

    /// Jitter multiplier applied to the throttle interval (overrides config)
    #[arg(long, global = true)]
    throttle_factor: Option<f64>,

    /// Per-decode deadline such as 500ms or 2s (overrides config)
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    decode_timeout: Option<Duration>,

    /// What to do with a slot whose decoder fails: retire or respawn
    #[arg(long, global = true, value_parser = parse_fault_policy)]
    fault_policy: Option<FaultPolicy>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode QR codes from image files
    Decode(DecodeArgs),
    /// Feed a synthetic frame stream through simulated decoders
    Bench(BenchArgs),
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(ClapArgs, Debug)]
struct DecodeArgs {
    /// Image files to decode
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Retry each image with inverted luminance when nothing is found
    #[arg(long, default_value_t = false)]
    invert: bool,

    /// Milliseconds between submissions
    #[arg(long, default_value_t = 10)]
    interval_ms: u64,
}

#[derive(ClapArgs, Debug)]
struct BenchArgs {
    /// Number of frames to offer
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// Frames offered per second
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Fastest simulated decode
    #[arg(long, default_value_t = 40)]
    min_latency_ms: u64,

    /// Slowest simulated decode
    #[arg(long, default_value_t = 120)]
    max_latency_ms: u64,

    /// Probability that a simulated decode finds a code
    #[arg(long, default_value_t = 0.3)]
    hit_rate: f64,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_runtime_config(&cli.pool)?;

    match cli.command {
        Command::Decode(args) => run_decode(config, args).await,
        Command::Bench(args) => run_bench(config, args).await,
        Command::Config(ConfigCommand::Show) => {
            let rendered =
                render_toml(&config).context("failed to render configuration")?;
            print!("{rendered}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_runtime_config(args: &PoolArgs) -> anyhow::Result<ScanPoolConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &args.env_file {
        loader = loader.with_env_file(path);
    }

    let ConfigLoad {
        mut config,
        metadata,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    if let Some(pool_size) = args.pool_size {
        config.pool_size = Some(pool_size);
    }
    if let Some(factor) = args.throttle_factor {
        config.throttle_factor = factor;
    }
    if let Some(timeout) = args.decode_timeout {
        config.decode_timeout_ms = Some(duration_to_ms(timeout));
    }
    if let Some(policy) = args.fault_policy {
        config.fault_policy = policy;
    }
    config.validate().context("invalid configuration")?;

    info!(
        pool.size = config.resolved_pool_size(),
        pool.latency_window = config.latency_window,
        pool.throttle_factor = config.throttle_factor,
        pool.decode_timeout_ms = config.decode_timeout_ms,
        pool.fault_policy = ?config.fault_policy,
        "pool configuration in effect"
    );

    Ok(config)
}

async fn run_decode(
    config: ScanPoolConfig,
    args: DecodeArgs,
) -> anyhow::Result<ExitCode> {
    let report = decode::run(
        config,
        DecodeOptions {
            paths: args.paths,
            invert: args.invert,
            interval: Duration::from_millis(args.interval_ms),
        },
    )
    .await?;

    for file in &report.files {
        let path = file.path.display();
        match &file.outcome {
            FileOutcome::Found {
                payload,
                latency_ms,
            } => println!("{path}: {payload} ({latency_ms}ms)"),
            FileOutcome::Missed { error, latency_ms } => {
                println!("{path}: no code ({error}, {latency_ms}ms)")
            }
            FileOutcome::Failed => println!("{path}: decoder failed"),
        }
    }

    if report.found() == 0 {
        warn!(files = report.files.len(), "no code found in any image");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_bench(
    config: ScanPoolConfig,
    args: BenchArgs,
) -> anyhow::Result<ExitCode> {
    let report = bench::run(
        config,
        BenchOptions {
            frames: args.frames,
            fps: args.fps,
            min_latency: Duration::from_millis(args.min_latency_ms),
            max_latency: Duration::from_millis(args.max_latency_ms),
            hit_rate: args.hit_rate,
        },
    )
    .await?;

    let counters = &report.counters;
    println!("frames offered:   {}", counters.accepted + counters.rejected());
    println!("accepted:         {}", counters.accepted);
    println!("throttled:        {}", counters.throttled);
    println!("saturated:        {}", counters.saturated);
    println!("exhausted:        {}", counters.exhausted);
    println!("decoded:          {}", report.results);
    println!(
        "acceptance rate:  {:.1}%",
        report.acceptance_rate() * 100.0
    );
    println!("elapsed:          {:.2?}", report.elapsed);

    let snapshot = &report.snapshot;
    println!("throttle:         {}ms", snapshot.throttle_interval_ms);
    println!("scan frequency:   {:.1} Hz", snapshot.scan_frequency_hz);
    println!("latency samples:  {:?}", snapshot.samples);
    for worker in &snapshot.workers {
        let latency = worker
            .latency_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "-".to_string());
        let status = if worker.faulted {
            "faulted".to_string()
        } else if let Some(failure) = &worker.failure {
            format!("respawned after: {failure}")
        } else if let Some(error) = worker.error {
            error.to_string()
        } else if worker.payload.is_some() {
            "found".to_string()
        } else {
            "idle".to_string()
        };
        println!(
            "  {}{} {:>8} {}",
            worker.slot,
            if worker.is_last_emitter { "*" } else { " " },
            latency,
            status
        );
    }

    Ok(ExitCode::SUCCESS)
}
