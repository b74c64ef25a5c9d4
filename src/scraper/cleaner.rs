use crate::models::{DailyRecord, RawSummaryRow};
use crate::scraper::parsers::normalise_code;
use chrono::NaiveDate;
use tracing::{debug, warn};

// ── Raw summary row → DailyRecord ─────────────────────────────────────────────

/// Convert one endpoint row into a record tagged with its trading date.
/// Rows without a code or close are dropped; a zero close is kept here and
/// filtered later by the return cleaner.
pub fn summary_row_to_record(date: NaiveDate, row: RawSummaryRow) -> Option<DailyRecord> {
    let code = row.stock_code.as_deref().map(normalise_code)?;
    if code.is_empty() {
        return None;
    }

    let Some(close) = row.close.filter(|c| c.is_finite()) else {
        warn!("{} on {}: no close price, row skipped", code, date);
        return None;
    };

    Some(DailyRecord {
        name: row.stock_name.unwrap_or_default().trim().to_string(),
        code,
        open: row.open_price,
        high: row.high,
        low: row.low,
        close,
        volume: to_count(row.volume),
        value: row.value.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0),
        frequency: to_count(row.frequency),
        date,
    })
}

pub fn clean_summary_rows(date: NaiveDate, rows: Vec<RawSummaryRow>) -> Vec<DailyRecord> {
    let total = rows.len();
    let records: Vec<DailyRecord> = rows
        .into_iter()
        .filter_map(|r| summary_row_to_record(date, r))
        .collect();

    if records.len() < total {
        debug!("{}: kept {} of {} rows", date, records.len(), total);
    }
    records
}

/// The endpoint sends counts as JSON floats.
fn to_count(v: Option<f64>) -> u64 {
    match v {
        Some(x) if x.is_finite() && x > 0.0 => x.round() as u64,
        _ => 0,
    }
}
