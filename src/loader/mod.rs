//! Untyped CSV tables for the resample and clean stages.
//!
//! Those stages work off whatever columns a file actually has, so rows are
//! kept as strings and columns are looked up by header name.

use crate::error::ProcessError;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// First header matching any of `names`, in the order given.
    pub fn find_column(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| self.column(n))
    }

    pub fn require_column(&self, name: &'static str) -> Result<usize, ProcessError> {
        self.column(name).ok_or(ProcessError::MissingColumn(name))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read a CSV with a header row. Short rows are padded, long rows cut,
    /// unreadable rows skipped.
    pub fn read(path: &Path) -> Result<Self, ProcessError> {
        if !path.exists() {
            return Err(ProcessError::MissingInput(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(path)
            .map_err(|source| csv_err(path, source))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|source| csv_err(path, source))?
            .iter()
            .map(str::to_string)
            .collect();
        let width = headers.len();

        let mut table = Table::new(headers);
        for (i, result) in reader.records().enumerate() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    warn!("Row {} in {:?}: {}", i + 1, path, e);
                    continue;
                }
            };
            let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
            row.resize(width, String::new());
            table.rows.push(row);
        }

        debug!("{:?}: {} rows × {} columns", path, table.len(), width);
        Ok(table)
    }

    /// Write the whole table, replacing any existing file.
    pub fn write(&self, path: &Path) -> Result<(), ProcessError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| io_err(parent, source))?;
        }

        let mut writer = csv::Writer::from_path(path).map_err(|source| csv_err(path, source))?;
        writer
            .write_record(&self.headers)
            .map_err(|source| csv_err(path, source))?;
        for row in &self.rows {
            writer.write_record(row).map_err(|source| csv_err(path, source))?;
        }
        writer.flush().map_err(|source| io_err(path, source))?;
        Ok(())
    }
}

fn io_err(path: &Path, source: std::io::Error) -> ProcessError {
    ProcessError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_err(path: &Path, source: csv::Error) -> ProcessError {
    ProcessError::Csv {
        path: path.to_path_buf(),
        source,
    }
}
