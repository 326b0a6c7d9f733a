use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use cctray_monitor::config::Config;
use cctray_monitor::feed::{AggregationResult, Aggregator};

/// Exit code for a pass with no feeds configured (the HTTP 400 equivalent).
const EXIT_UNCONFIGURED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "cctray-monitor", about = "Aggregate CCTray build status feeds")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, short, value_name = "FILE", default_value = "cctray-monitor.toml")]
    config: PathBuf,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one aggregation pass and print the result as JSON
    Status,
    /// Re-run the aggregation every refresh interval, one JSON line per pass
    Watch,
    /// Print refresh interval, colors and status mapping as JSON
    DisplayConfig,
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn build_aggregator(config: &Config) -> Result<Aggregator<reqwest::Client>> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("cctray-monitor/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    Ok(Aggregator::new(client, config.aggregator_options()))
}

fn exit_code_for(result: &AggregationResult) -> ExitCode {
    if result.is_unconfigured() {
        ExitCode::from(EXIT_UNCONFIGURED)
    } else {
        ExitCode::SUCCESS
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log_level in config")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?config, "Starting");

    match args.command {
        Command::Status => {
            let aggregator = build_aggregator(&config)?;
            let result = aggregator.aggregate(&config.feeds).await;
            print_json(&result, args.pretty)?;
            Ok(exit_code_for(&result))
        }
        Command::Watch => {
            let aggregator = build_aggregator(&config)?;
            let period = Duration::from_secs(config.refresh_interval_secs.max(1));
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let result = aggregator.aggregate(&config.feeds).await;
                        print_json(&result, args.pretty)?;
                        if result.is_unconfigured() {
                            return Ok(exit_code_for(&result));
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Interrupted, stopping watch");
                        return Ok(ExitCode::SUCCESS);
                    }
                }
            }
        }
        Command::DisplayConfig => {
            print_json(&config.display_settings(), args.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
