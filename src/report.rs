//! Plain-text report of a run-store.
//!
//! Gathers partition sizes, summary snapshots, lifetime totals and the
//! collection log so a run can be inspected without the dashboard.

use std::path::PathBuf;

use serde::Serialize;

use crate::aggregate::LifetimeTotals;
use crate::models::{Platform, SessionLogEntry, StoredRecord, SummaryRow};
use crate::store::RunStore;

/// Everything the report prints.
#[derive(Debug)]
pub struct StoreReport {
    pub path: PathBuf,
    pub partition_rows: Vec<(Platform, i64)>,
    pub summaries: Vec<SummaryRow>,
    pub lifetime: Vec<LifetimeTotals>,
    pub sessions: Vec<SessionLogEntry>,
    pub db_size_bytes: u64,
    pub wal_size_bytes: u64,
}

impl StoreReport {
    pub fn gather(store: &RunStore) -> Self {
        let summaries = store.read_summary_stats();
        let lifetime = Platform::ALL
            .into_iter()
            .map(|p| LifetimeTotals::from_snapshots(p, &summaries))
            .filter(|t| t.batches > 0)
            .collect();

        Self {
            path: store.path().to_path_buf(),
            partition_rows: Platform::ALL
                .into_iter()
                .map(|p| (p, store.row_count(p)))
                .collect(),
            summaries,
            lifetime,
            sessions: store.read_session_log(),
            db_size_bytes: u64::try_from(store.file_size_bytes()).unwrap_or(0),
            wal_size_bytes: store.wal_size_bytes(),
        }
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }

    pub fn render(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();

        out.push_str(&format!("\n{}\nRUN-STORE {}\n{}\n", rule, self.path.display(), rule));

        out.push_str("\nStored records:\n");
        for (platform, rows) in &self.partition_rows {
            out.push_str(&format!("  {:<16}{:>10}\n", format!("{}:", platform), rows));
        }

        if self.summaries.is_empty() {
            out.push_str("\nNo summary statistics yet.\n");
        }
        for row in &self.summaries {
            let stat = &row.stat;
            out.push_str(&format!(
                "\n{} (batch {}, {}):\n",
                stat.platform.as_str().to_uppercase(),
                row.id,
                row.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            out.push_str(&format!("  Total posts:      {:>10}\n", stat.total_posts));
            out.push_str(&format!("  Avg sentiment:    {:>10.3}\n", stat.avg_sentiment));
            out.push_str(&format!(
                "  Positive / neutral / negative: {} / {} / {}\n",
                stat.positive_count, stat.neutral_count, stat.negative_count
            ));
            out.push_str(&format!(
                "  Avg score:        {:>10.1}\n  Avg comments:     {:>10.1}\n",
                stat.avg_score, stat.avg_comments
            ));
        }

        if self.lifetime.iter().any(|t| t.batches > 1) {
            out.push_str("\nAcross all batches:\n");
            for totals in &self.lifetime {
                out.push_str(&format!(
                    "  {:<10} {} posts in {} batches, avg sentiment {:.3}\n",
                    totals.platform, totals.total_posts, totals.batches, totals.avg_sentiment
                ));
            }
        }

        if !self.sessions.is_empty() {
            out.push_str("\nCollection log:\n");
            for entry in &self.sessions {
                out.push_str(&format!(
                    "  {}  {:<8} {:<24} {:>6} items\n",
                    entry.extraction_time.format("%Y-%m-%d %H:%M"),
                    entry.platform,
                    entry.query,
                    entry.items_collected
                ));
            }
        }

        out.push_str(&format!(
            "\nDatabase size:    {:>10}  (+{} write-ahead log)\n",
            format_bytes(self.db_size_bytes),
            format_bytes(self.wal_size_bytes)
        ));
        out
    }
}

/// JSON document consumed by the dashboard.
#[derive(Debug, Serialize)]
pub struct StoreExport {
    pub posts: Vec<StoredRecord>,
    pub summary_stats: Vec<SummaryRow>,
    pub sessions: Vec<SessionLogEntry>,
}

impl StoreExport {
    pub fn gather(store: &RunStore) -> Self {
        Self {
            posts: store.read_all(None),
            summary_stats: store.read_summary_stats(),
            sessions: store.read_session_log(),
        }
    }
}

const SIZE_UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Binary-prefixed size, one decimal above a kibibyte.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < SIZE_UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, SIZE_UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        // One default SQLite page
        assert_eq!(format_bytes(4096), "4.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
        assert_eq!(format_bytes(2048 * 1024 * 1024 * 1024 * 1024), "2048.0 TB");
    }

    #[test]
    fn test_report_of_file_store_counts_wal() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RunStore::create_in(dir.path()).unwrap();
        crate::Pipeline::vader()
            .run(
                &mut store,
                vec![crate::RawInput {
                    id: Some("r1".into()),
                    platform: Some("reddit".into()),
                    text: Some("Pretty good release overall".into()),
                    created_utc: Some(crate::models::RawTimestamp::Seconds(1_700_000_000)),
                    ..Default::default()
                }],
            )
            .unwrap();

        let report = StoreReport::gather(&store);
        assert_eq!(report.partition_rows[0], (Platform::Reddit, 1));
        assert!(report.wal_size_bytes > 0);
        assert!(report.render().contains("write-ahead log"));
    }

    #[test]
    fn test_empty_store_report() {
        let store = RunStore::open_in_memory().unwrap();
        let report = StoreReport::gather(&store);
        assert_eq!(
            report.partition_rows,
            vec![(Platform::Reddit, 0), (Platform::Youtube, 0)]
        );
        assert!(report.lifetime.is_empty());
        assert!(report.render().contains("No summary statistics yet."));
    }

    #[test]
    fn test_export_document_shape() {
        let store = RunStore::open_in_memory().unwrap();
        store.log_session(Platform::Reddit, "rust", 0).unwrap();
        let json = serde_json::to_value(StoreExport::gather(&store)).unwrap();
        assert_eq!(json["posts"], serde_json::json!([]));
        assert_eq!(json["sessions"][0]["platform"], "reddit");
        assert_eq!(json["sessions"][0]["query"], "rust");
    }
}
