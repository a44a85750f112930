//! Error types for fmxmirror-core.
//!
//! Each collaborator gets its own error enum; `CoreError` is the umbrella
//! the library surfaces at its boundaries. The reconciliation engine keys
//! its retry behavior on `RemoteError::is_transient`.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for fmxmirror-core.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("source calendar error: {0}")]
    Source(#[from] SourceError),

    #[error("remote calendar error: {0}")]
    Remote(#[from] RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("failed to write configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("could not prepare data directory {path}: {message}")]
    DataDir { path: PathBuf, message: String },

    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("missing required configuration key: {0}")]
    MissingKey(String),

    #[error("unknown time zone '{0}' (expected an IANA name like America/New_York)")]
    UnknownTimezone(String),
}

/// Ledger (SQLite) errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("failed to open ledger at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("ledger migration failed: {0}")]
    MigrationFailed(String),

    #[error("ledger query failed: {0}")]
    QueryFailed(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::QueryFailed(err.to_string())
    }
}

/// Source adapter (FMX scrape) errors. Any of these is fatal to the run:
/// without a complete source batch there is nothing sound to reconcile.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {status} from the source calendar")]
    Status { status: u16 },

    #[error("agenda payload not found in the calendar page")]
    PayloadMissing,

    #[error("malformed agenda payload: {0}")]
    Payload(String),

    #[error("invalid event time '{value}': {message}")]
    Time { value: String, message: String },
}

/// Remote calendar API errors, bucketed the way the engine needs them:
/// transient failures are retried on the next pass, rejections repeat
/// until the source content changes, and not-found is meaningful on its
/// own (a delete that finds nothing already reached the desired state).
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("remote rejected the payload: {message}")]
    Rejected { message: String, code: String },

    #[error("remote event not found")]
    NotFound,

    #[error("remote unavailable (status {status})")]
    Unavailable { status: u16 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed remote response: {0}")]
    Response(String),
}

impl RemoteError {
    /// Whether the next pass may plausibly succeed without anything changing.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Unavailable { .. } | RemoteError::Network(_))
    }
}
