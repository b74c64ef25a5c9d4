use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::Frequency;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Summary endpoint and request pacing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_summary_path")]
    pub summary_path: String,

    /// Page length large enough to return every instrument in one page.
    #[serde(default = "default_page_length")]
    pub page_length: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_referer")]
    pub referer: String,

    #[serde(default = "default_origin")]
    pub origin: String,

    /// Some deployments of the endpoint reject requests without `X-Requested-With`.
    #[serde(default)]
    pub xhr_header: bool,
}

/// Where the tables live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_summary_dir")]
    pub summary_dir: PathBuf,

    #[serde(default = "default_cleaned_dir")]
    pub cleaned_dir: PathBuf,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,

    #[serde(default = "default_true")]
    pub resample_after_ingest: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://www.idx.co.id".to_string()
}
fn default_summary_path() -> String {
    "/primary/TradingSummary/GetStockSummary".to_string()
}
fn default_page_length() -> u32 {
    9999
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_min_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    3000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2000
}
fn default_max_consecutive_failures() -> u32 {
    5
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
fn default_referer() -> String {
    "https://www.idx.co.id/en/market-data/trading-summary/stock-summary/".to_string()
}
fn default_origin() -> String {
    "https://www.idx.co.id".to_string()
}
fn default_summary_dir() -> PathBuf {
    PathBuf::from("data/processed/idx_trading_summary")
}
fn default_cleaned_dir() -> PathBuf {
    PathBuf::from("data/processed")
}
fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 3, 1).unwrap_or_default()
}
fn default_true() -> bool {
    true
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            summary_path: default_summary_path(),
            page_length: default_page_length(),
            timeout_secs: default_timeout_secs(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            user_agent: default_user_agent(),
            referer: default_referer(),
            origin: default_origin(),
            xhr_header: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            summary_dir: default_summary_dir(),
            cleaned_dir: default_cleaned_dir(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            resample_after_ingest: true,
        }
    }
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl StorageConfig {
    /// Raw (uncleaned) table for a frequency: `idx_daily.csv`, `idx_weekly.csv`, ...
    pub fn raw_path(&self, freq: Frequency) -> PathBuf {
        self.summary_dir.join(format!("idx_{}.csv", freq.stem()))
    }

    pub fn daily_path(&self) -> PathBuf {
        self.raw_path(Frequency::Daily)
    }

    pub fn cleaned_path(&self, freq: Frequency) -> PathBuf {
        self.cleaned_dir.join(format!("idx_{}_cleaned.csv", freq.stem()))
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("IDX").separator("__"))
            .build()
            .context("Failed to read configuration sources")?;

        cfg.try_deserialize()
            .context("Invalid configuration")
    }
}
