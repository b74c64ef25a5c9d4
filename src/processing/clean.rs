//! Type coercion, filtering and per-instrument returns.

use crate::error::ProcessError;
use crate::loader::Table;
use crate::scraper::parsers::{format_number, parse_date, parse_number};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::{CLOSE_COLUMN, CODE_COLUMN, DATE_COLUMN, RETURN_COLUMN};

/// Columns coerced to numbers when present.
pub const NUMERIC_COLUMNS: [&str; 8] = [
    "Close",
    "OpenPrice",
    "Open",
    "High",
    "Low",
    "Volume",
    "Value",
    "Frequency",
];

/// Clean a daily or period table and attach a `Return` column.
///
/// 1. rows whose date does not parse are dropped, the rest normalised to ISO
/// 2. numeric columns coerced; anything non-numeric becomes an empty cell
/// 3. rows with a missing or non-positive close are dropped
/// 4. rows sorted by (code, date), stable
/// 5. instruments with fewer than two rows are dropped
/// 6. `Return = close / previous close - 1`; the first row of every
///    instrument has no return and is dropped
pub fn clean(table: &Table) -> Result<Table, ProcessError> {
    let code_idx = table.require_column(CODE_COLUMN)?;
    let date_idx = table.require_column(DATE_COLUMN)?;
    let close_idx = table.require_column(CLOSE_COLUMN)?;
    let numeric: Vec<usize> = NUMERIC_COLUMNS
        .iter()
        .filter_map(|c| table.column(c))
        .collect();

    // An existing Return column is recomputed, not duplicated.
    let mut headers = table.headers.clone();
    let return_idx = match table.column(RETURN_COLUMN) {
        Some(idx) => idx,
        None => {
            headers.push(RETURN_COLUMN.to_string());
            headers.len() - 1
        }
    };

    let mut kept: Vec<(NaiveDate, f64, Vec<String>)> = Vec::with_capacity(table.len());
    let (mut bad_dates, mut bad_close) = (0usize, 0usize);

    for row in &table.rows {
        let Some(date) = parse_date(&row[date_idx]) else {
            bad_dates += 1;
            continue;
        };

        let mut row = row.clone();
        row[date_idx] = date.format("%Y-%m-%d").to_string();
        for &idx in &numeric {
            row[idx] = parse_number(&row[idx]).map(format_number).unwrap_or_default();
        }
        row[code_idx] = row[code_idx].trim().to_string();

        match parse_number(&row[close_idx]) {
            Some(close) if close > 0.0 => kept.push((date, close, row)),
            _ => bad_close += 1,
        }
    }

    kept.sort_by(|a, b| a.2[code_idx].cmp(&b.2[code_idx]).then(a.0.cmp(&b.0)));

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, _, row) in &kept {
        *counts.entry(row[code_idx].as_str()).or_default() += 1;
    }
    let singletons = counts.values().filter(|&&n| n < 2).count();
    let keep_codes: HashSet<String> = counts
        .into_iter()
        .filter(|(_, n)| *n >= 2)
        .map(|(c, _)| c.to_string())
        .collect();

    let mut out = Table::new(headers);
    let mut prev: Option<(String, f64)> = None;
    for (_, close, mut row) in kept {
        if !keep_codes.contains(&row[code_idx]) {
            continue;
        }

        let ret = match &prev {
            Some((code, prev_close)) if *code == row[code_idx] => Some(close / prev_close - 1.0),
            _ => None,
        };
        prev = Some((row[code_idx].clone(), close));

        if let Some(ret) = ret {
            if return_idx < row.len() {
                row[return_idx] = format_number(ret);
            } else {
                row.push(format_number(ret));
            }
            out.rows.push(row);
        }
    }

    debug!(
        "Cleaned {} → {} rows ({} bad dates, {} bad closes, {} single-row instruments)",
        table.len(),
        out.len(),
        bad_dates,
        bad_close,
        singletons
    );

    if out.is_empty() {
        return Err(ProcessError::NoValidRows);
    }
    Ok(out)
}
