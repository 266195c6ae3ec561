//! In-batch deduplication and short-text filtering

use std::collections::HashSet;

use crate::models::{NormalizedRecord, Platform, ScoredRecord};

/// Records at or below this many characters of combined text are dropped.
pub const DEFAULT_MIN_TEXT_LEN: usize = 10;

/// Anything the batch filter can key and measure.
pub trait BatchRecord {
    fn key(&self) -> (Platform, &str);
    fn full_text(&self) -> &str;
}

impl BatchRecord for NormalizedRecord {
    fn key(&self) -> (Platform, &str) {
        (self.raw.platform, &self.raw.id)
    }

    fn full_text(&self) -> &str {
        &self.full_text
    }
}

impl BatchRecord for ScoredRecord {
    fn key(&self) -> (Platform, &str) {
        self.normalized.key()
    }

    fn full_text(&self) -> &str {
        &self.normalized.full_text
    }
}

/// Outcome counts of a [`filter_batch`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    pub duplicates: usize,
    pub too_short: usize,
}

/// Keep the first record seen per `(platform, id)` and drop records whose
/// combined text is `min_len` characters or shorter. Surviving records keep
/// their input order.
pub fn filter_batch<R: BatchRecord>(records: Vec<R>, min_len: usize) -> (Vec<R>, FilterStats) {
    let mut stats = FilterStats::default();
    let mut seen: HashSet<(Platform, String)> = HashSet::with_capacity(records.len());
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        let (platform, id) = record.key();
        if !seen.insert((platform, id.to_string())) {
            stats.duplicates += 1;
            continue;
        }
        if record.full_text().chars().count() <= min_len {
            stats.too_short += 1;
            continue;
        }
        kept.push(record);
    }

    (kept, stats)
}

/// [`filter_batch`] without the counts.
pub fn filter<R: BatchRecord>(records: Vec<R>, min_len: usize) -> Vec<R> {
    filter_batch(records, min_len).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRecord;
    use crate::normalize::normalize_record;
    use chrono::DateTime;

    fn record(platform: Platform, id: &str, text: &str) -> NormalizedRecord {
        normalize_record(RawRecord {
            id: id.into(),
            platform,
            title: String::new(),
            text: text.into(),
            author: "a".into(),
            created_utc: DateTime::from_timestamp(0, 0).unwrap(),
            score: 0,
            num_comments: 0,
            url: String::new(),
        })
    }

    #[test]
    fn test_length_boundary() {
        let records = vec![
            record(Platform::Reddit, "ten", "abcdefghij"),
            record(Platform::Reddit, "eleven", "abcdefghijk"),
        ];
        let kept = filter(records, DEFAULT_MIN_TEXT_LEN);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].raw.id, "eleven");
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 10 characters, 20 bytes
        let kept = filter(
            vec![record(Platform::Reddit, "u", "éééééééééé")],
            DEFAULT_MIN_TEXT_LEN,
        );
        assert!(kept.is_empty());
    }

    #[test]
    fn test_first_seen_wins() {
        let records = vec![
            record(Platform::Reddit, "a1", "the first version of it"),
            record(Platform::Reddit, "b2", "another record entirely"),
            record(Platform::Reddit, "a1", "the second version of it"),
        ];
        let (kept, stats) = filter_batch(records, DEFAULT_MIN_TEXT_LEN);
        assert_eq!(stats.duplicates, 1);
        let ids: Vec<_> = kept.iter().map(|r| r.raw.id.as_str()).collect();
        assert_eq!(ids, ["a1", "b2"]);
        assert_eq!(kept[0].full_text, "the first version of it");
    }

    #[test]
    fn test_same_id_on_different_platforms_is_not_a_duplicate() {
        let records = vec![
            record(Platform::Reddit, "x", "reddit post body text"),
            record(Platform::Youtube, "x", "youtube comment body"),
        ];
        assert_eq!(filter(records, DEFAULT_MIN_TEXT_LEN).len(), 2);
    }

    #[test]
    fn test_short_first_occurrence_still_claims_the_id() {
        let records = vec![
            record(Platform::Reddit, "a1", "short"),
            record(Platform::Reddit, "a1", "a much longer later copy"),
        ];
        let (kept, stats) = filter_batch(records, DEFAULT_MIN_TEXT_LEN);
        assert!(kept.is_empty());
        assert_eq!(stats, FilterStats { duplicates: 1, too_short: 1 });
    }

    #[test]
    fn test_empty_batch() {
        let (kept, stats) = filter_batch(Vec::<NormalizedRecord>::new(), DEFAULT_MIN_TEXT_LEN);
        assert!(kept.is_empty());
        assert_eq!(stats, FilterStats::default());
    }
}
