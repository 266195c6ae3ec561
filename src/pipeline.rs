//! Batch pipeline: validate, normalize, filter, score, store.
//!
//! A single bad record never aborts a batch. Input and scoring failures drop
//! that record and are counted in the [`BatchReport`]; only storage write
//! failures abort, and those roll back the entire insert.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::filter::{filter_batch, DEFAULT_MIN_TEXT_LEN};
use crate::models::{RawInput, RawRecord, ScoredRecord, SummaryStat};
use crate::normalize::normalize_record;
use crate::sentiment::{LexiconScorer, SentimentScorer, VaderScorer};
use crate::store::RunStore;

/// Counts of what happened to a batch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchReport {
    pub received: usize,
    pub rejected_input: usize,
    pub duplicates: usize,
    pub too_short: usize,
    pub scoring_failures: usize,
    /// Rows new to the store; ids it already held are not counted.
    pub stored: usize,
    pub summaries: Vec<SummaryStat>,
}

/// Records ready to be persisted, with the counts collected on the way.
#[derive(Debug, Default)]
pub struct PreparedBatch {
    pub records: Vec<ScoredRecord>,
    pub report: BatchReport,
}

/// Records decoded from a JSON array, plus how many elements were not records.
#[derive(Debug, Default)]
pub struct DecodedInputs {
    pub inputs: Vec<RawInput>,
    pub undecodable: usize,
}

/// Decode a JSON array of records element by element. An element with the
/// wrong shape is logged and counted; the rest of the array still decodes.
pub fn decode_inputs(content: &str) -> Result<DecodedInputs, serde_json::Error> {
    let values: Vec<Value> = serde_json::from_str(content)?;
    let mut decoded = DecodedInputs {
        inputs: Vec::with_capacity(values.len()),
        undecodable: 0,
    };

    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawInput>(value) {
            Ok(input) => decoded.inputs.push(input),
            Err(e) => {
                warn!("Dropping element {}: {}", index, e);
                decoded.undecodable += 1;
            }
        }
    }
    Ok(decoded)
}

/// The processing stages in front of the store.
pub struct Pipeline<L = VaderScorer> {
    scorer: SentimentScorer<L>,
    min_text_len: usize,
}

impl Pipeline<VaderScorer> {
    /// VADER scoring with the default minimum text length.
    pub fn vader() -> Self {
        Self::new(SentimentScorer::vader(), DEFAULT_MIN_TEXT_LEN)
    }
}

impl<L: LexiconScorer> Pipeline<L> {
    pub fn new(scorer: SentimentScorer<L>, min_text_len: usize) -> Self {
        Self {
            scorer,
            min_text_len,
        }
    }

    /// Run every stage up to, but not including, storage.
    pub fn prepare(&self, inputs: Vec<RawInput>) -> PreparedBatch {
        let mut report = BatchReport {
            received: inputs.len(),
            ..Default::default()
        };

        let mut normalized = Vec::with_capacity(inputs.len());
        for input in inputs {
            match RawRecord::try_from(input) {
                Ok(raw) => normalized.push(normalize_record(raw)),
                Err(e) => {
                    warn!("Dropping record: {}", e);
                    report.rejected_input += 1;
                }
            }
        }

        let (kept, filter_stats) = filter_batch(normalized, self.min_text_len);
        report.duplicates = filter_stats.duplicates;
        report.too_short = filter_stats.too_short;

        let mut records = Vec::with_capacity(kept.len());
        for record in kept {
            let id = record.raw.id.clone();
            let platform = record.raw.platform;
            match self.scorer.score_record(record) {
                Ok(scored) => records.push(scored),
                Err(e) => {
                    warn!("Dropping {} record {}: {}", platform, id, e);
                    report.scoring_failures += 1;
                }
            }
        }

        debug!(
            "Prepared {} of {} records ({} rejected, {} duplicates, {} too short, {} unscored)",
            records.len(),
            report.received,
            report.rejected_input,
            report.duplicates,
            report.too_short,
            report.scoring_failures
        );

        PreparedBatch { records, report }
    }

    /// Process a batch and commit it to `store`.
    pub fn run(
        &self,
        store: &mut RunStore,
        inputs: Vec<RawInput>,
    ) -> Result<BatchReport, StorageError> {
        let PreparedBatch {
            records,
            mut report,
        } = self.prepare(inputs);

        let outcome = store.insert(&records)?;
        report.stored = outcome.new_rows();
        report.summaries = outcome.summaries;

        info!(
            "Stored {} new records in {} ({} already present, {} summary snapshots)",
            report.stored,
            store.path().display(),
            outcome.collapsed,
            report.summaries.len()
        );
        Ok(report)
    }

    /// [`run`](Self::run) over decoded JSON, counting undecodable elements
    /// as rejected input.
    pub fn run_decoded(
        &self,
        store: &mut RunStore,
        decoded: DecodedInputs,
    ) -> Result<BatchReport, StorageError> {
        let mut report = self.run(store, decoded.inputs)?;
        report.received += decoded.undecodable;
        report.rejected_input += decoded.undecodable;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoringError;
    use crate::models::{Platform, RawTimestamp};

    struct FailsOn(&'static str);

    impl LexiconScorer for FailsOn {
        fn compound(&self, text: &str) -> Result<f64, ScoringError> {
            if text.contains(self.0) {
                Err(ScoringError::Engine("lexicon unavailable".into()))
            } else {
                Ok(0.3)
            }
        }
    }

    fn input(platform: &str, id: &str, text: &str) -> RawInput {
        RawInput {
            id: Some(id.into()),
            platform: Some(platform.into()),
            text: Some(text.into()),
            author: Some("someone".into()),
            created_utc: Some(RawTimestamp::Seconds(1_700_000_000)),
            score: Some(3),
            num_comments: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_prepare_counts_each_drop_reason() {
        let pipeline = Pipeline::new(SentimentScorer::new(FailsOn("explode")), 10);
        let mut no_id = input("reddit", "x", "a perfectly long text");
        no_id.id = None;

        let batch = pipeline.prepare(vec![
            input("reddit", "a1", "a perfectly long text"),
            input("reddit", "a1", "a perfectly long text again"),
            input("reddit", "a2", "tiny"),
            input("youtube", "y1", "this one will explode"),
            input("myspace", "m1", "a perfectly long text"),
            no_id,
        ]);

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].id(), "a1");
        assert_eq!(
            batch.report,
            BatchReport {
                received: 6,
                rejected_input: 2,
                duplicates: 1,
                too_short: 1,
                scoring_failures: 1,
                stored: 0,
                summaries: Vec::new(),
            }
        );
    }

    #[test]
    fn test_empty_batch_is_total() {
        let pipeline = Pipeline::vader();
        let mut store = RunStore::open_in_memory().unwrap();
        let report = pipeline.run(&mut store, Vec::new()).unwrap();
        assert_eq!(report, BatchReport::default());
        assert!(store.read_all(None).is_empty());
    }

    #[test]
    fn test_run_stores_scored_records() {
        let pipeline = Pipeline::vader();
        let mut store = RunStore::open_in_memory().unwrap();
        let report = pipeline
            .run(
                &mut store,
                vec![
                    input("reddit", "p1", "This tool is absolutely amazing and wonderful!!!"),
                    input("reddit", "p2", "I hate this, it is terrible and awful."),
                ],
            )
            .unwrap();

        assert_eq!(report.stored, 2);
        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.summaries[0].platform, Platform::Reddit);
        assert_eq!(report.summaries[0].positive_count, 1);
        assert_eq!(report.summaries[0].negative_count, 1);

        let again = pipeline
            .run(
                &mut store,
                vec![input("reddit", "p1", "This tool is absolutely amazing and wonderful!!!")],
            )
            .unwrap();
        assert_eq!(again.stored, 0);
        assert_eq!(store.row_count(Platform::Reddit), 2);
    }

    #[test]
    fn test_wrong_typed_element_does_not_sink_the_array() {
        let decoded = decode_inputs(
            r#"[
                {"id": "good", "platform": "reddit", "text": "a perfectly long text",
                 "created_utc": 1700000000, "score": 3},
                {"id": "bad1", "platform": "reddit", "text": "a perfectly long text",
                 "created_utc": 1700000000, "score": "n/a"},
                {"id": 42, "platform": "reddit", "text": "a perfectly long text",
                 "created_utc": 1700000000},
                "not even an object"
            ]"#,
        )
        .unwrap();
        assert_eq!(decoded.inputs.len(), 1);
        assert_eq!(decoded.undecodable, 3);

        let pipeline = Pipeline::new(SentimentScorer::new(FailsOn("never")), 10);
        let mut store = RunStore::open_in_memory().unwrap();
        let report = pipeline.run_decoded(&mut store, decoded).unwrap();

        assert_eq!(report.received, 4);
        assert_eq!(report.rejected_input, 3);
        assert_eq!(report.stored, 1);
        assert_eq!(store.read_all(None)[0].id, "good");
    }

    #[test]
    fn test_non_array_import_is_an_error() {
        assert!(decode_inputs(r#"{"id": "a1"}"#).is_err());
        assert!(decode_inputs("[").is_err());
        assert_eq!(decode_inputs("[]").unwrap().undecodable, 0);
    }
}
