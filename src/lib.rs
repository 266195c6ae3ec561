//! Social Sentiment Library
//!
//! Collects Reddit posts and YouTube comments, cleans their text, scores it
//! with VADER and keeps each run in its own SQLite run-store together with
//! per-platform summary snapshots.

pub mod aggregate;
pub mod collect;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod sentiment;
pub mod store;

pub use config::Config;
pub use error::{CollectError, InputError, PipelineError, ScoringError, StorageError};
pub use models::{
    NormalizedRecord, Platform, RawInput, RawRecord, ScoredRecord, SentimentLabel, StoredRecord,
    SummaryStat,
};
pub use pipeline::{BatchReport, Pipeline};
pub use sentiment::SentimentScorer;
pub use store::RunStore;
