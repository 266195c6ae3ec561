//! Per-platform summary statistics.
//!
//! Summaries are batch-scoped snapshots: each call describes only the records
//! it is given. Lifetime figures are derived from the snapshot sequence with
//! [`LifetimeTotals::from_snapshots`].

use crate::models::{Platform, ScoredRecord, SentimentLabel, SummaryRow, SummaryStat};

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

impl SummaryStat {
    /// Statistics over the records of `platform` found in `records`.
    pub fn from_batch(platform: Platform, records: &[ScoredRecord]) -> Self {
        let mut total = 0usize;
        let mut sentiment_sum = 0.0;
        let mut score_sum = 0.0;
        let mut comments_sum = 0.0;
        let (mut positive, mut negative, mut neutral) = (0i64, 0i64, 0i64);

        for record in records.iter().filter(|r| r.platform() == platform) {
            total += 1;
            sentiment_sum += record.sentiment_score;
            score_sum += record.raw().score as f64;
            comments_sum += record.raw().num_comments as f64;
            match record.sentiment_label {
                SentimentLabel::Positive => positive += 1,
                SentimentLabel::Negative => negative += 1,
                SentimentLabel::Neutral => neutral += 1,
            }
        }

        SummaryStat {
            platform,
            total_posts: total as i64,
            avg_sentiment: mean(sentiment_sum, total),
            positive_count: positive,
            negative_count: negative,
            neutral_count: neutral,
            avg_score: mean(score_sum, total),
            avg_comments: mean(comments_sum, total),
        }
    }
}

/// One snapshot per platform present in the batch, in partition order.
pub fn summarize_batch(records: &[ScoredRecord]) -> Vec<SummaryStat> {
    Platform::ALL
        .into_iter()
        .filter(|p| records.iter().any(|r| r.platform() == *p))
        .map(|p| SummaryStat::from_batch(p, records))
        .collect()
}

/// Lifetime figures for one platform, folded from its snapshots.
///
/// Averages are weighted by each snapshot's `total_posts`.
#[derive(Debug, Clone, PartialEq)]
pub struct LifetimeTotals {
    pub platform: Platform,
    pub batches: usize,
    pub total_posts: i64,
    pub positive_count: i64,
    pub negative_count: i64,
    pub neutral_count: i64,
    pub avg_sentiment: f64,
    pub avg_score: f64,
    pub avg_comments: f64,
}

impl LifetimeTotals {
    pub fn from_snapshots(platform: Platform, rows: &[SummaryRow]) -> Self {
        let mut totals = LifetimeTotals {
            platform,
            batches: 0,
            total_posts: 0,
            positive_count: 0,
            negative_count: 0,
            neutral_count: 0,
            avg_sentiment: 0.0,
            avg_score: 0.0,
            avg_comments: 0.0,
        };
        let (mut sentiment_sum, mut score_sum, mut comments_sum) = (0.0, 0.0, 0.0);

        for stat in rows.iter().map(|r| &r.stat).filter(|s| s.platform == platform) {
            let weight = stat.total_posts as f64;
            totals.batches += 1;
            totals.total_posts += stat.total_posts;
            totals.positive_count += stat.positive_count;
            totals.negative_count += stat.negative_count;
            totals.neutral_count += stat.neutral_count;
            sentiment_sum += stat.avg_sentiment * weight;
            score_sum += stat.avg_score * weight;
            comments_sum += stat.avg_comments * weight;
        }

        let posts = totals.total_posts.max(0) as usize;
        totals.avg_sentiment = mean(sentiment_sum, posts);
        totals.avg_score = mean(score_sum, posts);
        totals.avg_comments = mean(comments_sum, posts);
        totals
    }
}
