#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that generates synthetic OEE sensor event streams.

mod config;
mod output;

use std::{
    io::{self, BufWriter, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use oee_sim_pipeline::Generator;
use oee_sim_system_analytics::Analytics;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    config::{GeneratorTable, Scenario, TargetsTable, WindowTable},
    output::{OutputFormat, TimestampFormat},
};

const LOG_ENV: &str = "OEE_SIM_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "oee-sim",
    version,
    about = "Generates running, counter and waste event streams for an OEE target"
)]
struct CliArgs {
    /// TOML scenario file; flags override its values.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Window start as RFC 3339 or epoch milliseconds.
    #[arg(long, value_name = "INSTANT")]
    start: Option<String>,
    /// Window end as RFC 3339 or epoch milliseconds; defaults to now.
    #[arg(long, value_name = "INSTANT", conflicts_with = "duration")]
    end: Option<String>,
    /// Window length in seconds, measured from the start or back from the end.
    #[arg(long, value_name = "SECONDS")]
    duration: Option<u64>,
    /// Share of the window spent running.
    #[arg(long)]
    availability: Option<f64>,
    /// Share of the theoretical throughput achieved while running.
    #[arg(long)]
    performance: Option<f64>,
    /// Share of produced units that are not rejected.
    #[arg(long)]
    quality: Option<f64>,
    /// Theoretical pieces per hour.
    #[arg(long, value_name = "PIECES")]
    hourly_target: Option<f64>,
    /// Counter value preceding the first production event.
    #[arg(long, value_name = "COUNT")]
    counter_start: Option<u64>,
    /// Seed for a reproducible run; drawn at random when omitted.
    #[arg(long)]
    seed: Option<u64>,
    /// Payload layout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    /// Timestamp encoding for events.
    #[arg(long, value_enum, default_value_t = TimestampFormat::Millis)]
    timestamps: TimestampFormat,
    /// Drop the leftover time after chunking instead of folding it into the last chunk.
    #[arg(long)]
    discard_remainder: bool,
    /// Exclusive upper bound of the delay between a unit and its waste marker.
    #[arg(long, value_name = "MILLIS")]
    jitter_ms: Option<u32>,
}

impl CliArgs {
    fn overrides(&self) -> Scenario {
        Scenario {
            window: WindowTable {
                start: self.start.clone(),
                end: self.end.clone(),
                duration_secs: self.duration,
            },
            targets: TargetsTable {
                availability: self.availability,
                performance: self.performance,
                quality: self.quality,
                hourly_target: self.hourly_target,
                counter_start: self.counter_start,
            },
            generator: GeneratorTable {
                seed: self.seed,
                discard_remainder: self.discard_remainder.then_some(true),
                jitter_ms: self.jitter_ms,
            },
        }
    }
}

/// Entry point for the OEE simulator command-line interface.
fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(args: &CliArgs) -> Result<()> {
    let scenario = match &args.config {
        Some(path) => config::load_scenario(path)?,
        None => Scenario::default(),
    };
    let settings = scenario.overlay(args.overrides()).resolve(Utc::now())?;
    let seed = settings.seed.unwrap_or_else(rand::random);
    info!(seed, "resolved generation settings");

    let generation = Generator::new(settings.generator).generate_seeded(&settings.request, seed);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match args.format {
        OutputFormat::Json => output::write_json(&mut out, &generation.streams, args.timestamps)?,
        OutputFormat::Jsonl => output::write_jsonl(&mut out, &generation.streams, args.timestamps)?,
        OutputFormat::Summary => {
            let request = &settings.request;
            let report = Analytics::new().report(&generation, request.window(), request.targets());
            output::write_summary(&mut out, request, &report, seed, args.timestamps)?;
        }
    }
    out.flush().context("failed to flush output")
}
