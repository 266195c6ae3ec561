//! Sentiment scoring.
//!
//! The compound magnitude comes from an external lexicon engine (VADER). This
//! module owns only the thresholding policy that turns a compound score into a
//! [`SentimentLabel`].

use vader_sentiment::SentimentIntensityAnalyzer;

use crate::error::ScoringError;
use crate::models::{NormalizedRecord, ScoredRecord, SentimentLabel};

/// Scores at or above this are positive.
pub const POSITIVE_THRESHOLD: f64 = 0.05;
/// Scores at or below this are negative.
pub const NEGATIVE_THRESHOLD: f64 = -0.05;

/// A lexicon engine returning a compound score in [-1, 1].
pub trait LexiconScorer: Send + Sync {
    fn compound(&self, text: &str) -> Result<f64, ScoringError>;
}

/// VADER compound scoring backed by the `vader_sentiment` lexicon.
pub struct VaderScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconScorer for VaderScorer {
    fn compound(&self, text: &str) -> Result<f64, ScoringError> {
        let scores = self.analyzer.polarity_scores(text);
        scores
            .get("compound")
            .copied()
            .ok_or_else(|| ScoringError::Engine("no compound score in result".to_string()))
    }
}

/// Map a compound score to its label. Both cutoffs are inclusive.
pub fn label_for(score: f64) -> SentimentLabel {
    if score >= POSITIVE_THRESHOLD {
        SentimentLabel::Positive
    } else if score <= NEGATIVE_THRESHOLD {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

/// Applies the labelling policy on top of a [`LexiconScorer`].
pub struct SentimentScorer<L = VaderScorer> {
    engine: L,
}

impl SentimentScorer<VaderScorer> {
    pub fn vader() -> Self {
        Self::new(VaderScorer::new())
    }
}

impl<L: LexiconScorer> SentimentScorer<L> {
    pub fn new(engine: L) -> Self {
        Self { engine }
    }

    /// Score free text. Blank text is neutral without consulting the engine.
    pub fn score(&self, text: &str) -> Result<(f64, SentimentLabel), ScoringError> {
        if text.trim().is_empty() {
            return Ok((0.0, SentimentLabel::Neutral));
        }

        let score = self.engine.compound(text)?;
        if !score.is_finite() || !(-1.0..=1.0).contains(&score) {
            return Err(ScoringError::OutOfRange(score));
        }

        Ok((score, label_for(score)))
    }

    /// Score a record on its combined text.
    pub fn score_record(&self, record: NormalizedRecord) -> Result<ScoredRecord, ScoringError> {
        let (sentiment_score, sentiment_label) = self.score(&record.full_text)?;
        Ok(ScoredRecord {
            normalized: record,
            sentiment_score,
            sentiment_label,
        })
    }
}
