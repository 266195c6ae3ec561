//! Record types for each stage of the pipeline.
//!
//! Records move through a fixed progression, each stage owning the previous:
//! [`RawInput`] (untrusted wire shape) → [`RawRecord`] → [`NormalizedRecord`]
//! → [`ScoredRecord`] → persisted, and read back as [`StoredRecord`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Source platform of a record. Each platform owns one storage partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Reddit,
    Youtube,
}

impl Platform {
    /// Every platform with a partition, in partition order.
    pub const ALL: [Platform; 2] = [Platform::Reddit, Platform::Youtube];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
            Platform::Youtube => "youtube",
        }
    }

    /// Name of the partition table holding this platform's records.
    pub fn table(&self) -> &'static str {
        match self {
            Platform::Reddit => "reddit_posts",
            Platform::Youtube => "youtube_posts",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reddit" => Ok(Platform::Reddit),
            "youtube" => Ok(Platform::Youtube),
            other => Err(InputError::UnknownPlatform(other.to_string())),
        }
    }
}

impl ToSql for Platform {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Platform {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Three-way sentiment label derived from a compound score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a label string that is not one of the three labels.
#[derive(Debug, thiserror::Error)]
#[error("unknown sentiment label: {0}")]
pub struct ParseLabelError(String);

impl FromStr for SentimentLabel {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "negative" => Ok(SentimentLabel::Negative),
            other => Err(ParseLabelError(other.to_string())),
        }
    }
}

impl ToSql for SentimentLabel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SentimentLabel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Creation time as reported by a platform: unix seconds or a date string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Seconds(i64),
    FractionalSeconds(f64),
    Text(String),
}

impl RawTimestamp {
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, String> {
        match self {
            RawTimestamp::Seconds(secs) => DateTime::from_timestamp(*secs, 0)
                .ok_or_else(|| format!("timestamp {secs} out of range")),
            RawTimestamp::FractionalSeconds(secs) if secs.is_finite() => {
                DateTime::from_timestamp(secs.trunc() as i64, 0)
                    .ok_or_else(|| format!("timestamp {secs} out of range"))
            }
            RawTimestamp::FractionalSeconds(secs) => Err(format!("timestamp {secs} is not finite")),
            RawTimestamp::Text(text) => parse_timestamp_text(text),
        }
    }
}

fn parse_timestamp_text(text: &str) -> Result<DateTime<Utc>, String> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("unrecognized timestamp {text:?}"))
}

/// Untrusted, loosely-typed record as handed over by a producer.
///
/// Fields a platform has no concept of are left `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_utc: Option<RawTimestamp>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub num_comments: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A validated collected item. `(platform, id)` is its natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: String,
    pub platform: Platform,
    pub title: String,
    pub text: String,
    pub author: String,
    pub created_utc: DateTime<Utc>,
    pub score: i64,
    pub num_comments: i64,
    pub url: String,
}

impl TryFrom<RawInput> for RawRecord {
    type Error = InputError;

    fn try_from(input: RawInput) -> Result<Self, Self::Error> {
        let id = input
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(InputError::MissingKey("id"))?;
        let platform: Platform = input
            .platform
            .filter(|p| !p.trim().is_empty())
            .ok_or(InputError::MissingKey("platform"))?
            .parse()?;

        let created_utc = input
            .created_utc
            .ok_or_else(|| InputError::MissingField {
                id: id.clone(),
                field: "created_utc",
            })?
            .to_datetime()
            .map_err(|reason| InputError::Malformed {
                id: id.clone(),
                field: "created_utc",
                reason,
            })?;

        let num_comments = input.num_comments.unwrap_or(0);
        if num_comments < 0 {
            return Err(InputError::Malformed {
                id,
                field: "num_comments",
                reason: format!("negative count {num_comments}"),
            });
        }

        Ok(RawRecord {
            id,
            platform,
            title: input.title.unwrap_or_default(),
            text: input.text.unwrap_or_default(),
            author: input.author.unwrap_or_default(),
            created_utc,
            score: input.score.unwrap_or(0),
            num_comments,
            url: input.url.unwrap_or_default(),
        })
    }
}

/// A raw record with its cleaned, searchable text.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub raw: RawRecord,
    pub title_clean: String,
    pub text_clean: String,
    /// `title_clean` and `text_clean` joined by a space, trimmed.
    pub full_text: String,
}

/// A normalized record with its sentiment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub normalized: NormalizedRecord,
    /// Compound score in [-1.0, 1.0].
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
}

impl ScoredRecord {
    pub fn raw(&self) -> &RawRecord {
        &self.normalized.raw
    }

    pub fn platform(&self) -> Platform {
        self.normalized.raw.platform
    }

    pub fn id(&self) -> &str {
        &self.normalized.raw.id
    }
}

/// A row read back from a partition, re-tagged with its platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub platform: Platform,
    pub id: String,
    pub title: String,
    pub text: String,
    pub author: String,
    pub created_utc: DateTime<Utc>,
    pub score: i64,
    pub num_comments: i64,
    pub url: String,
    pub title_clean: String,
    pub text_clean: String,
    pub full_text: String,
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    /// When the store ingested the row.
    pub created_at: DateTime<Utc>,
}

/// Batch-scoped statistics for one platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStat {
    pub platform: Platform,
    pub total_posts: i64,
    pub avg_sentiment: f64,
    pub positive_count: i64,
    pub negative_count: i64,
    pub neutral_count: i64,
    pub avg_score: f64,
    pub avg_comments: f64,
}

/// A persisted [`SummaryStat`] snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub id: i64,
    #[serde(flatten)]
    pub stat: SummaryStat,
    pub created_at: DateTime<Utc>,
}

/// Audit row for one collection action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionLogEntry {
    pub platform: Platform,
    /// Subreddit name or search term.
    pub query: String,
    pub items_collected: i64,
    pub extraction_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: &str, platform: &str) -> RawInput {
        RawInput {
            id: Some(id.to_string()),
            platform: Some(platform.to_string()),
            text: Some("body".to_string()),
            created_utc: Some(RawTimestamp::Seconds(1_700_000_000)),
            ..Default::default()
        }
    }

    #[test]
    fn test_platform_roundtrip() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
            assert_eq!(platform.table(), format!("{}_posts", platform));
        }
        assert!(matches!(
            "myspace".parse::<Platform>(),
            Err(InputError::UnknownPlatform(_))
        ));
    }

    #[test]
    fn test_missing_title_defaults_to_empty() {
        let record = RawRecord::try_from(input("c1", "youtube")).unwrap();
        assert_eq!(record.title, "");
        assert_eq!(record.platform, Platform::Youtube);
        assert_eq!(record.score, 0);
    }

    #[test]
    fn test_missing_key_rejected() {
        let mut no_id = input("", "reddit");
        no_id.id = None;
        assert!(matches!(
            RawRecord::try_from(no_id),
            Err(InputError::MissingKey("id"))
        ));

        let mut no_platform = input("a1", "reddit");
        no_platform.platform = None;
        assert!(matches!(
            RawRecord::try_from(no_platform),
            Err(InputError::MissingKey("platform"))
        ));
    }

    #[test]
    fn test_missing_created_utc_rejected() {
        let mut record = input("a1", "reddit");
        record.created_utc = None;
        assert!(matches!(
            RawRecord::try_from(record),
            Err(InputError::MissingField { field: "created_utc", .. })
        ));
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(RawTimestamp::Seconds(1_700_000_000).to_datetime().unwrap(), expected);
        assert_eq!(
            RawTimestamp::FractionalSeconds(1_700_000_000.7).to_datetime().unwrap(),
            expected
        );
        assert_eq!(
            RawTimestamp::Text("2023-11-14T22:13:20Z".into()).to_datetime().unwrap(),
            expected
        );
        assert_eq!(
            RawTimestamp::Text("2023-11-14 22:13:20".into()).to_datetime().unwrap(),
            expected
        );
        assert!(RawTimestamp::Text("yesterday".into()).to_datetime().is_err());
    }

    #[test]
    fn test_raw_input_from_json() {
        let json = r#"{"id": "x9", "platform": "reddit", "title": null,
                       "text": "hello", "created_utc": 1700000000.0, "score": -3}"#;
        let parsed: RawInput = serde_json::from_str(json).unwrap();
        let record = RawRecord::try_from(parsed).unwrap();
        assert_eq!(record.score, -3);
        assert_eq!(record.title, "");
        assert_eq!(record.num_comments, 0);
    }

    #[test]
    fn test_negative_comment_count_is_malformed() {
        let mut record = input("a1", "reddit");
        record.num_comments = Some(-1);
        assert!(matches!(
            RawRecord::try_from(record),
            Err(InputError::Malformed { field: "num_comments", .. })
        ));
    }
}
