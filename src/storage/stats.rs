//! Ad-hoc queries over the CSV tables through an in-memory DuckDB.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use duckdb::Connection;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    pub rows: i64,
    pub instruments: i64,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

/// Quote a path as a SQL string literal.
fn csv_source(path: &Path) -> String {
    let p = path.to_string_lossy().replace('\'', "''");
    format!("read_csv_auto('{}', header = true)", p)
}

pub fn table_stats(path: &Path) -> Result<TableStats> {
    let conn = Connection::open_in_memory()?;
    let sql = format!(
        "SELECT COUNT(*), COUNT(DISTINCT StockCode), \
                MIN(CAST(Date AS DATE)), MAX(CAST(Date AS DATE)) \
         FROM {}",
        csv_source(path)
    );

    conn.query_row(&sql, [], |r| {
        Ok(TableStats {
            rows: r.get(0)?,
            instruments: r.get(1)?,
            first: r.get(2)?,
            last: r.get(3)?,
        })
    })
    .with_context(|| format!("Failed to query {:?}", path))
}

pub fn list_symbols(path: &Path) -> Result<Vec<String>> {
    let conn = Connection::open_in_memory()?;
    let sql = format!(
        "SELECT DISTINCT CAST(StockCode AS VARCHAR) FROM {} ORDER BY 1",
        csv_source(path)
    );

    let mut stmt = conn.prepare(&sql)?;
    let syms: Vec<String> = stmt
        .query_map([], |r| r.get(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(syms)
}
