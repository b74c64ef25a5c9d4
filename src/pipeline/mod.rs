//! Pipeline orchestrator: ties scraper → storage → processing together.
//!
//! ## Run modes
//!
//! `ingest()` — fetch every missing trading day into the daily table, then
//!   regenerate the weekly/monthly tables. Resumable: days already in the
//!   table are not requested again.
//!
//! `resample()` — regenerate `idx_weekly.csv` / `idx_monthly.csv` from the
//!   daily table. Pure function of its input; rerunning changes nothing.
//!
//! `process()` — clean the daily and weekly tables and derive a cleaned
//!   monthly table from the cleaned daily one. Each step is independent: a
//!   failure is logged and the next step still runs.

pub mod fetcher;

use crate::config::AppConfig;
use crate::error::ProcessError;
use crate::loader::Table;
use crate::models::Frequency;
use crate::processing::{clean, resample};
use crate::scraper::IdxScraper;
use crate::storage::DailyStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;
use tracing::{error, info, warn};

use self::fetcher::{FetchOptions, FetchStats, Fetcher};

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn ingest(&self, start: NaiveDate, end: NaiveDate) -> Result<FetchStats> {
        let daily_path = self.config.storage.daily_path();
        let mut store = DailyStore::open(&daily_path)
            .with_context(|| format!("Failed to open daily table {:?}", daily_path))?;

        let scraper = IdxScraper::new(&self.config.scraper).context("Failed to build scraper")?;
        let opts = FetchOptions::from(&self.config.scraper);

        info!("=== Step 1: Fetching trading summaries ===");
        let stats = Fetcher::new(&scraper, opts)
            .run(&mut store, start, end, shutdown_signal())
            .await
            .context("Fetch loop failed")?;

        info!(
            "Fetch done: {} days requested | {} written ({} records) | {} closed | {} failed | {} already stored",
            stats.attempted, stats.days_written, stats.records, stats.closed, stats.failed, stats.skipped
        );
        if stats.aborted {
            warn!("Fetch stopped early after repeated failures; rerun to resume");
        }

        if self.config.pipeline.resample_after_ingest {
            info!("=== Step 2: Generating weekly and monthly aggregates ===");
            if let Err(e) = self.resample() {
                error!("Resampling failed: {}", e);
            }
        }

        Ok(stats)
    }

    /// Rebuild both period tables from the daily table.
    pub fn resample(&self) -> Result<(), ProcessError> {
        let storage = &self.config.storage;
        let daily = Table::read(&storage.daily_path())?;

        for freq in [Frequency::Weekly, Frequency::Monthly] {
            let out = resample(&daily, freq)?;
            let path = storage.raw_path(freq);
            out.write(&path)?;
            info!("  {}: {} rows → {:?}", freq, out.len(), path);
        }
        Ok(())
    }

    pub fn process(&self) -> ProcessReport {
        let storage = &self.config.storage;
        let mut report = ProcessReport::default();

        let daily_out = storage.cleaned_path(Frequency::Daily);
        report.record(
            Frequency::Daily,
            clean_file(&storage.daily_path(), &daily_out),
        );

        report.record(
            Frequency::Weekly,
            clean_file(
                &storage.raw_path(Frequency::Weekly),
                &storage.cleaned_path(Frequency::Weekly),
            ),
        );

        // The raw monthly table is rebuilt from the cleaned daily rows so
        // that bad closes never reach a monthly aggregate.
        report.record(
            Frequency::Monthly,
            monthly_from_cleaned_daily(&daily_out, &storage.cleaned_path(Frequency::Monthly)),
        );

        report
    }
}

fn clean_file(input: &Path, output: &Path) -> Result<usize, ProcessError> {
    let cleaned = clean(&Table::read(input)?)?;
    cleaned.write(output)?;
    Ok(cleaned.len())
}

fn monthly_from_cleaned_daily(daily: &Path, output: &Path) -> Result<usize, ProcessError> {
    let monthly = resample(&Table::read(daily)?, Frequency::Monthly)?;
    let cleaned = clean(&monthly)?;
    cleaned.write(output)?;
    Ok(cleaned.len())
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Default)]
pub struct ProcessReport {
    pub written: Vec<(Frequency, usize)>,
    pub failed: Vec<(Frequency, String)>,
}

impl ProcessReport {
    fn record(&mut self, freq: Frequency, result: Result<usize, ProcessError>) {
        match result {
            Ok(rows) => {
                info!("{}: {} cleaned rows", freq, rows);
                self.written.push((freq, rows));
            }
            Err(e) => {
                error!("{}: processing failed: {}", freq, e);
                self.failed.push((freq, e.to_string()));
            }
        }
    }
}
