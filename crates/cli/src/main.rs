//! DbTune operator CLI
//!
//! Thin wrapper over the optimization suite for operator use:
//!
//! ```bash
//! dbtune initialize --auto-create-indexes --force-optimization
//! dbtune analyze-performance --output json
//! dbtune monitor-performance --duration 60 --threshold 10
//! ```

#![allow(clippy::print_stdout)]

mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use dbtune_domain::config::SuiteConfig;
use dbtune_infra::driver::SqliteDriver;
use dbtune_infra::OptimizationCoordinator;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbtune")]
#[command(about = "Database performance optimization suite", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file (default: environment, then
    /// ./dbtune.toml, ./config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the suite, run the initial analysis, and report component
    /// status
    Initialize {
        /// Automatically create the top recommended indexes
        #[arg(long)]
        auto_create_indexes: bool,

        /// Skip automatic partition maintenance
        #[arg(long)]
        skip_partitioning: bool,

        /// Run one full forced optimization cycle after initializing
        #[arg(long)]
        force_optimization: bool,
    },

    /// Print the current consolidated performance report
    AnalyzePerformance {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
        output: OutputFormat,
    },

    /// Poll query activity and print alerts when a threshold is exceeded
    MonitorPerformance {
        /// Monitoring duration in seconds
        #[arg(long, default_value_t = 300)]
        duration: u64,

        /// Query-count alert threshold per polling window
        #[arg(long, default_value_t = 10)]
        threshold: u64,
    },
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Console,
    /// Pretty-printed JSON
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let coordinator = build_coordinator(config)?;

    match cli.command {
        Commands::Initialize { auto_create_indexes, skip_partitioning, force_optimization } => {
            commands::initialize::run(
                &coordinator,
                commands::initialize::Options {
                    auto_create_indexes,
                    skip_partitioning,
                    force_optimization,
                },
            )
            .await
        }
        Commands::AnalyzePerformance { output } => {
            commands::analyze::run(&coordinator, output == OutputFormat::Json).await
        }
        Commands::MonitorPerformance { duration, threshold } => {
            commands::monitor::run(&coordinator, duration, threshold).await
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<SuiteConfig> {
    let config = match path {
        Some(path) => dbtune_infra::config::load_from_file(Some(path))?,
        None => dbtune_infra::config::load()?,
    };
    Ok(config)
}

fn build_coordinator(config: SuiteConfig) -> anyhow::Result<OptimizationCoordinator> {
    let driver = Arc::new(SqliteDriver::new(&config.databases)?);
    Ok(OptimizationCoordinator::new(config, driver.clone(), driver.clone(), driver))
}
