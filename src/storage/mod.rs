//! Append-only daily table.
//!
//! ## Contract
//!
//! - Schema is fixed to [`DailyRecord::COLUMNS`]; opening a file with any other
//!   header fails instead of appending misaligned rows.
//! - The header is written exactly once, when the file is new or empty.
//! - One writer per file. The [`Checkpoint`] is read once at open and kept
//!   current in memory, so a date appended in this process is never fetched
//!   or appended again.

pub mod stats;

use crate::error::StoreError;
use crate::models::DailyRecord;
use crate::scraper::parsers::parse_date;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ── Checkpoint ────────────────────────────────────────────────────────────────

/// Dates already present in the daily table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checkpoint {
    dates: BTreeSet<NaiveDate>,
}

impl Checkpoint {
    /// Scan only the `Date` column. A missing file is an empty checkpoint.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|source| csv_err(path, source))?;

        let headers = reader.headers().map_err(|source| csv_err(path, source))?.clone();
        let Some(idx) = headers.iter().position(|h| h.trim() == "Date") else {
            return Err(StoreError::SchemaMismatch {
                path: path.to_path_buf(),
                found: headers.iter().map(str::to_string).collect(),
                expected: DailyRecord::COLUMNS.iter().map(|c| c.to_string()).collect(),
            });
        };

        let mut dates = BTreeSet::new();
        let mut bad = 0usize;
        for result in reader.records() {
            let record = result.map_err(|source| csv_err(path, source))?;
            match record.get(idx).and_then(parse_date) {
                Some(d) => {
                    dates.insert(d);
                }
                None => bad += 1,
            }
        }
        if bad > 0 {
            warn!("{:?}: {} rows with unreadable dates ignored for checkpoint", path, bad);
        }

        Ok(Self { dates })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn insert(&mut self, date: NaiveDate) {
        self.dates.insert(date);
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn latest(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}

// ── DailyStore ────────────────────────────────────────────────────────────────

pub struct DailyStore {
    path: PathBuf,
    checkpoint: Checkpoint,
}

impl DailyStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| io_err(parent, source))?;
        }

        if has_content(path)? {
            check_schema(path)?;
        }

        let checkpoint = Checkpoint::load(path)?;
        if !checkpoint.is_empty() {
            info!(
                "Found {} days already stored (latest {:?}). Resuming…",
                checkpoint.len(),
                checkpoint.latest()
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            checkpoint,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Append one trading day and mark it done. Returns rows written.
    pub fn append(&mut self, date: NaiveDate, records: &[DailyRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let write_header = !has_content(&self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| io_err(&self.path, source))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);

        for rec in records {
            writer
                .serialize(rec)
                .map_err(|source| csv_err(&self.path, source))?;
        }
        writer.flush().map_err(|source| io_err(&self.path, source))?;

        self.checkpoint.insert(date);
        debug!("{}: appended {} rows to {:?}", date, records.len(), self.path);
        Ok(records.len())
    }
}

fn has_content(path: &Path) -> Result<bool, StoreError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len() > 0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(io_err(path, source)),
    }
}

fn check_schema(path: &Path) -> Result<(), StoreError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| csv_err(path, source))?;
    let found: Vec<String> = reader
        .headers()
        .map_err(|source| csv_err(path, source))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if found.iter().map(String::as_str).eq(DailyRecord::COLUMNS) {
        Ok(())
    } else {
        Err(StoreError::SchemaMismatch {
            path: path.to_path_buf(),
            found,
            expected: DailyRecord::COLUMNS.iter().map(|c| c.to_string()).collect(),
        })
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_err(path: &Path, source: csv::Error) -> StoreError {
    StoreError::Csv {
        path: path.to_path_buf(),
        source,
    }
}
