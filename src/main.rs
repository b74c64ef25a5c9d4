mod config;
mod error;
mod loader;
mod models;
mod pipeline;
mod processing;
mod scraper;
mod storage;
mod utils;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::models::Frequency;
use crate::pipeline::Pipeline;
use crate::storage::stats::{list_symbols, table_stats};

#[derive(Parser)]
#[command(name = "idx-pipeline", about = "IDX trading-summary ingestion and processing", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch daily trading summaries and rebuild weekly/monthly aggregates
    Ingest {
        /// Data source provider (only `idx` is wired up)
        #[arg(long)]
        source: String,

        /// Symbol of interest (informational)
        #[arg(long)]
        symbol: Option<String>,

        /// First date to fetch (default: pipeline.start_date)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date to fetch (default: today)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Run data processing pipelines
    Process {
        #[arg(long = "type", value_enum, default_value = "clean")]
        kind: ProcessKind,
    },

    /// Run strategy backtests
    Backtest {
        #[arg(long)]
        strategy: String,

        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Live or paper trading execution
    Trade {
        #[arg(long, value_enum, default_value = "paper")]
        mode: TradeMode,

        #[arg(long)]
        strategy: String,
    },

    /// Regenerate weekly/monthly tables from the daily table
    Resample,

    /// Show row counts and date ranges of the stored tables
    Stats,

    /// List all instrument codes in the daily table
    Symbols,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProcessKind {
    Clean,
    Validate,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TradeMode {
    Paper,
    Live,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(log_filter(cli.verbose)))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Ingest {
            source,
            symbol,
            start,
            end,
        } => {
            info!("[Ingestion] Starting ingestion from source: {}", source);
            if let Some(symbol) = &symbol {
                info!("[Ingestion] Target symbol: {}", symbol);
            }

            if source.eq_ignore_ascii_case("idx") {
                let _t = utils::Timer::start("IDX trading-summary ingest");
                let start = start.unwrap_or(config.pipeline.start_date);
                let end = end.unwrap_or_else(|| Local::now().date_naive());
                let stats = Pipeline::new(config).ingest(start, end).await?;
                info!(
                    "Done: {} days, {} records, {} failed{}",
                    stats.days_written,
                    utils::fmt_number(stats.records as i64),
                    stats.failed,
                    if stats.interrupted { " (interrupted)" } else { "" }
                );
            } else {
                warn!("[Ingestion] Source '{}' not yet implemented.", source);
            }
        }

        Command::Process { kind } => match kind {
            ProcessKind::Clean => {
                let _t = utils::Timer::start("Clean + returns");
                let report = Pipeline::new(config).process();
                info!(
                    "Done: {} tables written, {} failed",
                    report.written.len(),
                    report.failed.len()
                );
            }
            ProcessKind::Validate => {
                info!("[Processing] Running validate pipeline... (not implemented)");
            }
        },

        Command::Backtest {
            strategy,
            start,
            end,
        } => {
            info!("[Backtest] Initializing strategy: {}", strategy);
            if let (Some(start), Some(end)) = (start, end) {
                info!("[Backtest] Period: {} to {}", start, end);
            }
        }

        Command::Trade { mode, strategy } => {
            info!(
                "[Execution] Starting {:?} trading with strategy: {}",
                mode, strategy
            );
        }

        Command::Resample => {
            let _t = utils::Timer::start("Resample");
            Pipeline::new(config)
                .resample()
                .context("Resampling failed")?;
        }

        Command::Stats => {
            println!("─────────────────────────────────");
            println!("  IDX Pipeline — Table Stats");
            println!("─────────────────────────────────");
            for freq in [Frequency::Daily, Frequency::Weekly, Frequency::Monthly] {
                let path = config.storage.raw_path(freq);
                if !path.exists() {
                    println!("  {:<8} : —", freq);
                    continue;
                }
                let s = table_stats(&path)?;
                println!(
                    "  {:<8} : {} rows, {} instruments, {} → {}",
                    freq,
                    utils::fmt_number(s.rows),
                    utils::fmt_number(s.instruments),
                    fmt_date(s.first),
                    fmt_date(s.last),
                );
            }
            println!("─────────────────────────────────");
        }

        Command::Symbols => {
            let path = config.storage.daily_path();
            if !path.exists() {
                println!("No daily table — run `idx-pipeline ingest --source idx` first.");
                return Ok(());
            }
            let syms = list_symbols(&path)?;
            println!("{} symbols:", syms.len());
            for s in &syms {
                println!("  {}", s);
            }
        }
    }

    Ok(())
}

/// Log targets are module paths of the `idx-pipeline` binary crate.
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "idx_pipeline=info,warn",
        1 => "idx_pipeline=debug,info",
        _ => "trace",
    }
}

fn fmt_date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.to_string()).unwrap_or_else(|| "—".into())
}
