//! Error types for each stage of the pipeline.
//!
//! Every failure kind gets its own enum so callers can decide per kind
//! whether to drop a record, abort a batch, or carry on with an empty result.

use std::path::PathBuf;

use thiserror::Error;

/// A collected item could not be turned into a [`RawRecord`](crate::models::RawRecord).
///
/// The offending record is dropped; the rest of the batch continues.
#[derive(Debug, Error)]
pub enum InputError {
    /// The record has no `id` or no `platform`, so it has no natural key.
    #[error("record is missing its `{0}` key")]
    MissingKey(&'static str),

    /// A required non-key field is absent.
    #[error("record {id} is missing required field `{field}`")]
    MissingField { id: String, field: &'static str },

    /// The platform name is not one this system stores.
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    /// A field is present but cannot be interpreted.
    #[error("record {id} has malformed `{field}`: {reason}")]
    Malformed {
        id: String,
        field: &'static str,
        reason: String,
    },
}

impl InputError {
    /// True when the record lacks its natural key entirely.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, InputError::MissingKey(_))
    }
}

/// The lexicon engine failed to produce a usable compound score.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// The engine returned NaN, infinity, or a value outside [-1, 1].
    #[error("sentiment engine returned out-of-range score {0}")]
    OutOfRange(f64),

    /// The engine reported a failure of its own.
    #[error("sentiment engine failed: {0}")]
    Engine(String),
}

/// Errors raised by the run-store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing file could not be opened or initialized.
    #[error("failed to open store {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A write failed; the enclosing transaction has been rolled back.
    #[error("write to {table} failed: {source}")]
    Write {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// A read failed (most commonly a missing table).
    #[error("read from {table} failed: {source}")]
    Read {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// A numeric column was handed a value that is not a finite number.
    #[error("column {column} requires a finite number, got {value}")]
    NonNumeric { column: &'static str, value: f64 },

    /// Filesystem error while locating or creating stores.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn write(table: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| StorageError::Write { table, source }
    }

    pub(crate) fn read(table: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| StorageError::Read { table, source }
    }

    /// True for failures that aborted a write and rolled it back.
    pub fn is_write_failure(&self) -> bool {
        matches!(
            self,
            StorageError::Write { .. } | StorageError::NonNumeric { .. }
        )
    }
}

/// Errors from platform collectors.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Network failure, timeout or undecodable body.
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The platform answered with an error status.
    #[error("API error: {0}")]
    Api(String),

    /// The collector is missing credentials or settings.
    #[error("collector configuration error: {0}")]
    Config(String),
}

/// Umbrella error for callers that drive the whole pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Collect(#[from] CollectError),
}
