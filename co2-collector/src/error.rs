//! Error types for the collection engine.
//!
//! Every per-zone failure is handled at the zone-iteration level by the
//! collector; only [`ConfigError`] can stop a run, and only at startup.

use std::path::PathBuf;

/// Failure to obtain a JSON body from the upstream API.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network failure, timeout or malformed HTTP exchange.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered, but not with JSON (gateway pages, empty bodies).
    #[error("response is not JSON (HTTP {status}): {source}")]
    NotJson {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
}

/// An `ok` response that lacks the fields a reading needs.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("response has no `data` object")]
    MissingData,
    #[error("field `{0}` is missing or has the wrong type")]
    MissingField(&'static str),
}

/// Failure to append a row to a series file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write series file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("row has {actual} columns but the {schema} schema has {expected}")]
    ColumnMismatch {
        schema: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Startup configuration problems: unreadable inputs, bad arguments.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("directory {0} does not exist")]
    MissingOutputDir(PathBuf),
    #[error("missing required argument {0}")]
    MissingArgument(&'static str),
    #[error("invalid API url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid polling interval {0} (expected a finite, non-negative number of seconds)")]
    InvalidInterval(f64),
    #[error("cannot build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
