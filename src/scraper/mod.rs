pub mod cleaner;
pub mod http_client;
pub mod parsers;
pub mod retry;

use crate::config::ScraperConfig;
use crate::error::FetchError;
use crate::models::{DailyRecord, SummaryResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use self::cleaner::clean_summary_rows;
use self::http_client::HttpClient;
use self::parsers::html_title;

// ── Source trait ──────────────────────────────────────────────────────────────

/// What one trading day looks like from the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum DaySummary {
    /// Session data, one record per instrument.
    Records(Vec<DailyRecord>),
    /// Empty payload or 404: exchange holiday or no session.
    Closed,
}

/// Swappable data source abstraction. One call is one attempt; retrying is
/// the caller's business.
#[async_trait]
pub trait SummarySource: Send + Sync {
    async fn fetch_summary(&self, date: NaiveDate) -> Result<DaySummary, FetchError>;
}

// ── IDX scraper ───────────────────────────────────────────────────────────────

pub struct IdxScraper {
    client: HttpClient,
    endpoint: Url,
    page_length: u32,
}

impl IdxScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let base = config.base_url.trim_end_matches('/');
        let endpoint = Url::parse(&format!("{}{}", base, config.summary_path))
            .with_context(|| format!("Invalid summary endpoint {}{}", base, config.summary_path))?;

        Ok(Self {
            client: HttpClient::new(config)?,
            endpoint,
            page_length: config.page_length,
        })
    }

    /// e.g. `.../GetStockSummary?length=9999&start=0&date=20220301`
    fn summary_url(&self, date: NaiveDate) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("length", &self.page_length.to_string())
            .append_pair("start", "0")
            .append_pair("date", &date.format("%Y%m%d").to_string());
        url
    }
}

#[async_trait]
impl SummarySource for IdxScraper {
    async fn fetch_summary(&self, date: NaiveDate) -> Result<DaySummary, FetchError> {
        let (status, body) = self.client.get(self.summary_url(date)).await?;
        interpret_response(date, status, &body)
    }
}

/// Map a raw HTTP exchange onto a day outcome.
fn interpret_response(
    date: NaiveDate,
    status: StatusCode,
    body: &str,
) -> Result<DaySummary, FetchError> {
    if status == StatusCode::NOT_FOUND {
        debug!("{}: 404, treating as closed", date);
        return Ok(DaySummary::Closed);
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
        });
    }

    let parsed: SummaryResponse = serde_json::from_str(body).map_err(|e| {
        let reason = match html_title(body) {
            Some(title) => format!("HTML page instead of JSON ({})", title),
            None => e.to_string(),
        };
        FetchError::Malformed { reason }
    })?;

    let records = clean_summary_rows(date, parsed.data.unwrap_or_default());
    if records.is_empty() {
        Ok(DaySummary::Closed)
    } else {
        Ok(DaySummary::Records(records))
    }
}
