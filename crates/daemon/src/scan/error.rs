use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure fetching a search page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    InvalidUrl { url: String, message: String },
    Timeout { url: String },
    Request { url: String, message: String },
    Status { url: String, status: u16 },
    Body { url: String, message: String },
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::InvalidUrl { url, message } => {
                write!(f, "invalid search url `{url}`: {message}")
            }
            FetchError::Timeout { url } => write!(f, "request to `{url}` timed out"),
            FetchError::Request { url, message } => {
                write!(f, "request to `{url}` failed: {message}")
            }
            FetchError::Status { url, status } => write!(f, "`{url}` returned HTTP {status}"),
            FetchError::Body { url, message } => {
                write!(f, "failed to read response body from `{url}`: {message}")
            }
        }
    }
}

impl Error for FetchError {}

/// Fetched payload did not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    InvalidJson(String),
    MissingField(&'static str),
}

impl Display for ExtractionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::InvalidJson(message) => {
                write!(f, "search response is not valid JSON: {message}")
            }
            ExtractionError::MissingField(field) => {
                write!(f, "search response is missing string field `{field}`")
            }
        }
    }
}

impl Error for ExtractionError {}

/// Per-query and per-cycle scan failures.
///
/// Everything except [`ScanError::Persistence`] is scoped to one query:
/// the cycle records it and moves on. A persistence failure aborts the
/// cycle since dedup correctness depends on the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    InvalidQuery { key: String, message: String },
    Network { key: String, source: FetchError },
    Extraction { key: String, source: ExtractionError },
    Persistence { message: String },
}

impl ScanError {
    pub fn persistence(error: &anyhow::Error) -> Self {
        ScanError::Persistence { message: format!("{error:#}") }
    }

    pub fn is_cycle_fatal(&self) -> bool {
        matches!(self, ScanError::Persistence { .. })
    }

    pub fn is_extraction(&self) -> bool {
        matches!(self, ScanError::Extraction { .. })
    }
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::InvalidQuery { key, message } => {
                write!(f, "query `{key}` is invalid: {message}")
            }
            ScanError::Network { key, source } => write!(f, "query `{key}`: {source}"),
            ScanError::Extraction { key, source } => write!(f, "query `{key}`: {source}"),
            ScanError::Persistence { message } => write!(f, "known-id store failure: {message}"),
        }
    }
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ScanError::Network { source, .. } => Some(source),
            ScanError::Extraction { source, .. } => Some(source),
            _ => None,
        }
    }
}
