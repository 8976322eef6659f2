use std::path::PathBuf;

use anyhow::{Context, Result};
use cellcast::analytics::{parse_date_bound, BoundSide, UsageQuery};
use cellcast::config::PipelineConfig;
use cellcast::core::Target;
use cellcast::engine::TelemetryEngine;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Forecasts and demand analytics over a cellular telemetry CSV.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Telemetry dataset (CSV with a header row)
    #[arg(short, long)]
    data: PathBuf,

    /// JSON configuration file; defaults apply to missing keys
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the scaler and trained models (overrides the config)
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dataset overview, localities and network types
    Summary,
    /// Train every segment model and persist the result
    Train,
    /// Forecast one segment
    Predict {
        #[arg(short, long)]
        locality: String,
        #[arg(short, long)]
        network_type: String,
        /// Hours ahead; the configured default when omitted
        #[arg(long)]
        horizon: Option<i64>,
        /// throughput or signal_strength
        #[arg(short, long, default_value = "throughput")]
        target: String,
    },
    /// Network-type usage
    Usage {
        #[arg(short, long)]
        locality: Option<String>,
        /// Inclusive start (RFC 3339, date-time or date)
        #[arg(long)]
        start: Option<String>,
        /// Inclusive end (RFC 3339, date-time or date)
        #[arg(long)]
        end: Option<String>,
    },
    /// Hour by weekday patterns of a metric
    Patterns {
        #[arg(short, long)]
        locality: Option<String>,
        #[arg(short, long, default_value = "throughput")]
        metric: String,
    },
    /// Locality demand ranking
    Demand {
        #[arg(short, long, default_value = "composite")]
        metric: String,
        /// current or all
        #[arg(short, long, default_value = "current")]
        time_range: String,
    },
    /// Recorded metrics of every segment
    Metrics,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays pipeable
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cellcast={}", cli.log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = cli.model_dir {
        config = config.with_model_dir(dir);
    }

    let engine = TelemetryEngine::load_csv(config, &cli.data)
        .with_context(|| format!("loading dataset {}", cli.data.display()))?;

    match cli.command {
        Commands::Summary => {
            #[derive(Serialize)]
            struct Overview<T, L, N> {
                summary: T,
                localities: L,
                network_types: N,
            }
            print_json(&Overview {
                summary: engine.summary(),
                localities: engine.localities(),
                network_types: engine.network_types(),
            })
        }
        Commands::Train => {
            // previous models are carried over for segments that fail
            engine.initialize()?;
            let report = engine.train()?;
            print_json(&report)
        }
        Commands::Predict {
            locality,
            network_type,
            horizon,
            target,
        } => {
            engine.initialize()?;
            let target: Target = target.parse()?;
            let forecast = engine.predict(&locality, &network_type, horizon, target)?;
            print_json(&forecast)
        }
        Commands::Usage {
            locality,
            start,
            end,
        } => {
            let query = UsageQuery {
                locality,
                start: start
                    .as_deref()
                    .map(|s| parse_date_bound(s, BoundSide::Start))
                    .transpose()?,
                end: end
                    .as_deref()
                    .map(|s| parse_date_bound(s, BoundSide::End))
                    .transpose()?,
            };
            print_json(&engine.usage(&query)?)
        }
        Commands::Patterns { locality, metric } => {
            let report = engine.time_patterns(locality.as_deref(), metric.parse()?)?;
            print_json(&report)
        }
        Commands::Demand { metric, time_range } => {
            let report = engine.location_demand(metric.parse()?, time_range.parse()?)?;
            print_json(&report)
        }
        Commands::Metrics => {
            engine.initialize()?;
            print_json(&engine.metrics_snapshot())
        }
    }
}
