use std::path::PathBuf;
use thiserror::Error;

/// A single failed attempt against the summary endpoint.
///
/// Every variant is transient from the fetcher's point of view: the retry
/// policy re-issues the request and only the exhausted result counts against
/// the consecutive-failure guardrail.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {reason}")]
    Malformed { reason: String },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Failures of the append-only daily table.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path:?} has header {found:?}, expected {expected:?}")]
    SchemaMismatch {
        path: PathBuf,
        found: Vec<String>,
        expected: Vec<String>,
    },
}

/// Failures of the resample / clean stages.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("input table {0:?} not found")]
    MissingInput(PathBuf),

    #[error("required column '{0}' is missing")]
    MissingColumn(&'static str),

    #[error("no aggregatable columns (open/high/low/close/volume/value/frequency) found")]
    NoAggregatableColumns,

    #[error("no valid rows left after filtering")]
    NoValidRows,

    #[error("date {0} has no period end")]
    DateOutOfRange(chrono::NaiveDate),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
