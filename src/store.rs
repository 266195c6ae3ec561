//! Run-store persistence on SQLite.
//!
//! One store file per pipeline run. Each platform owns a `{platform}_posts`
//! partition; `summary_stats` and `session_log` are append-only. Every table
//! is declared `STRICT`, so SQLite refuses values whose type does not match
//! the column (a blob in a REAL column, for instance).

use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::{debug, info, warn};

use crate::aggregate::summarize_batch;
use crate::error::StorageError;
use crate::models::{
    Platform, ScoredRecord, SessionLogEntry, StoredRecord, SummaryRow, SummaryStat,
};

/// File name prefix shared by every run-store.
pub const STORE_PREFIX: &str = "social_media_";

const SUMMARY_TABLE: &str = "summary_stats";
const SESSION_TABLE: &str = "session_log";

/// What one [`RunStore::insert`] call did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InsertOutcome {
    /// Rows written before duplicate collapsing.
    pub inserted: usize,
    /// Rows removed because their id was already stored.
    pub collapsed: usize,
    /// Snapshots appended to `summary_stats`.
    pub summaries: Vec<SummaryStat>,
}

impl InsertOutcome {
    /// Rows that are new to the store.
    pub fn new_rows(&self) -> usize {
        self.inserted.saturating_sub(self.collapsed)
    }
}

/// Handle to one run-store file.
pub struct RunStore {
    conn: Connection,
    path: PathBuf,
}

impl RunStore {
    /// Create a fresh, timestamp-named store in `dir`.
    pub fn create_in<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = fresh_store_path(dir, Local::now().naive_local());
        info!("Creating run-store {}", path.display());
        Self::open(path)
    }

    /// Open (or create) the store at `path` and make sure its tables exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path).map_err(|source| StorageError::Open {
            path: path.clone(),
            source,
        })?;

        // Single writer, concurrent dashboard readers
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
            .map_err(|source| StorageError::Open {
                path: path.clone(),
                source,
            })?;

        let store = Self { conn, path };
        store.initialize()?;
        Ok(store)
    }

    /// Store backed by memory only. Nothing survives the handle.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| StorageError::Open {
            path: path.clone(),
            source,
        })?;
        let store = Self { conn, path };
        store.initialize()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialize(&self) -> Result<(), StorageError> {
        let mut schema = String::new();
        for platform in Platform::ALL {
            let table = platform.table();
            schema.push_str(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    row_seq INTEGER PRIMARY KEY AUTOINCREMENT,  -- physical insertion order
                    id TEXT NOT NULL,                           -- platform-scoped identifier
                    title TEXT NOT NULL,
                    text TEXT NOT NULL,
                    author TEXT NOT NULL,
                    created_utc INTEGER NOT NULL,               -- platform creation time (Unix)
                    score INTEGER NOT NULL,
                    num_comments INTEGER NOT NULL,
                    url TEXT NOT NULL,
                    title_clean TEXT NOT NULL,
                    text_clean TEXT NOT NULL,
                    full_text TEXT NOT NULL,
                    sentiment_score REAL NOT NULL CHECK(sentiment_score BETWEEN -1.0 AND 1.0),
                    sentiment_label TEXT NOT NULL
                        CHECK(sentiment_label IN ('positive', 'neutral', 'negative')),
                    created_at INTEGER NOT NULL                 -- ingestion time (Unix)
                ) STRICT;

                CREATE INDEX IF NOT EXISTS idx_{table}_id ON {table}(id);
                "#
            ));
        }

        schema.push_str(
            r#"
            CREATE TABLE IF NOT EXISTS summary_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                platform TEXT NOT NULL,
                total_posts INTEGER NOT NULL CHECK(total_posts >= 0),
                avg_sentiment REAL NOT NULL,
                positive_count INTEGER NOT NULL CHECK(positive_count >= 0),
                negative_count INTEGER NOT NULL CHECK(negative_count >= 0),
                neutral_count INTEGER NOT NULL CHECK(neutral_count >= 0),
                avg_score REAL NOT NULL,
                avg_comments REAL NOT NULL,
                created_at INTEGER NOT NULL
            ) STRICT;

            CREATE TABLE IF NOT EXISTS session_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                platform TEXT NOT NULL,
                query TEXT NOT NULL,
                items_collected INTEGER NOT NULL CHECK(items_collected >= 0),
                extraction_time INTEGER NOT NULL
            ) STRICT;
            "#,
        );

        self.conn
            .execute_batch(&schema)
            .map_err(|source| StorageError::Open {
                path: self.path.clone(),
                source,
            })
    }

    /// Insert a batch, collapse duplicate ids per partition and append the
    /// batch's summary snapshots, all in one transaction.
    ///
    /// When an id already exists in a partition the earliest stored row is
    /// kept.
    pub fn insert(&mut self, records: &[ScoredRecord]) -> Result<InsertOutcome, StorageError> {
        if records.is_empty() {
            debug!("Empty batch, nothing to insert");
            return Ok(InsertOutcome::default());
        }

        let ingested_at = Utc::now().timestamp();
        let tx = self
            .conn
            .transaction()
            .map_err(StorageError::write("transaction"))?;

        let mut outcome = InsertOutcome::default();
        for platform in Platform::ALL {
            let batch: Vec<&ScoredRecord> = records
                .iter()
                .filter(|r| r.platform() == platform)
                .collect();
            if batch.is_empty() {
                continue;
            }

            insert_partition(&tx, platform, &batch, ingested_at)?;
            let collapsed = collapse_duplicates(&tx, platform)?;
            outcome.inserted += batch.len();
            outcome.collapsed += collapsed;
            info!(
                "Inserted {} {} records ({} duplicates collapsed)",
                batch.len(),
                platform,
                collapsed
            );
        }

        outcome.summaries = append_summaries(&tx, records, ingested_at)?;

        tx.commit().map_err(StorageError::write("transaction"))?;
        Ok(outcome)
    }

    /// Append one snapshot per platform present in `records`.
    ///
    /// [`insert`](Self::insert) already does this; call it directly only for
    /// records that are persisted some other way.
    pub fn recompute_summary(
        &mut self,
        records: &[ScoredRecord],
    ) -> Result<Vec<SummaryStat>, StorageError> {
        let tx = self
            .conn
            .transaction()
            .map_err(StorageError::write(SUMMARY_TABLE))?;
        let summaries = append_summaries(&tx, records, Utc::now().timestamp())?;
        tx.commit().map_err(StorageError::write(SUMMARY_TABLE))?;
        Ok(summaries)
    }

    /// Record one collection action in the audit log.
    pub fn log_session(
        &self,
        platform: Platform,
        query: &str,
        items_collected: usize,
    ) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO session_log (platform, query, items_collected, extraction_time)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    platform,
                    query,
                    items_collected as i64,
                    Utc::now().timestamp()
                ],
            )
            .map_err(StorageError::write(SESSION_TABLE))?;
        Ok(())
    }

    /// Stored records of one partition, or of every partition in partition
    /// order. Unreadable partitions contribute no rows.
    pub fn read_all(&self, platform_filter: Option<Platform>) -> Vec<StoredRecord> {
        let platforms = match platform_filter {
            Some(platform) => vec![platform],
            None => Platform::ALL.to_vec(),
        };

        let mut records = Vec::new();
        for platform in platforms {
            match self.read_partition(platform) {
                Ok(rows) => records.extend(rows),
                Err(e) => warn!("No rows read from {}: {}", platform.table(), e),
            }
        }
        records
    }

    fn read_partition(&self, platform: Platform) -> Result<Vec<StoredRecord>, StorageError> {
        let table = platform.table();
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT id, title, text, author, created_utc, score, num_comments, url,
                        title_clean, text_clean, full_text, sentiment_score, sentiment_label,
                        created_at
                 FROM {table} ORDER BY row_seq"
            ))
            .map_err(StorageError::read(table))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(StoredRecord {
                    platform,
                    id: row.get("id")?,
                    title: row.get("title")?,
                    text: row.get("text")?,
                    author: row.get("author")?,
                    created_utc: timestamp(row, "created_utc")?,
                    score: row.get("score")?,
                    num_comments: row.get("num_comments")?,
                    url: row.get("url")?,
                    title_clean: row.get("title_clean")?,
                    text_clean: row.get("text_clean")?,
                    full_text: row.get("full_text")?,
                    sentiment_score: row.get("sentiment_score")?,
                    sentiment_label: row.get("sentiment_label")?,
                    created_at: timestamp(row, "created_at")?,
                })
            })
            .map_err(StorageError::read(table))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::read(table))
    }

    /// Every summary snapshot in append order.
    pub fn read_summary_stats(&self) -> Vec<SummaryRow> {
        self.try_read_summary_stats().unwrap_or_else(|e| {
            warn!("No summary stats read: {}", e);
            Vec::new()
        })
    }

    fn try_read_summary_stats(&self) -> Result<Vec<SummaryRow>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, platform, total_posts, avg_sentiment, positive_count, negative_count,
                        neutral_count, avg_score, avg_comments, created_at
                 FROM summary_stats ORDER BY id",
            )
            .map_err(StorageError::read(SUMMARY_TABLE))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SummaryRow {
                    id: row.get("id")?,
                    stat: SummaryStat {
                        platform: row.get("platform")?,
                        total_posts: row.get("total_posts")?,
                        avg_sentiment: row.get("avg_sentiment")?,
                        positive_count: row.get("positive_count")?,
                        negative_count: row.get("negative_count")?,
                        neutral_count: row.get("neutral_count")?,
                        avg_score: row.get("avg_score")?,
                        avg_comments: row.get("avg_comments")?,
                    },
                    created_at: timestamp(row, "created_at")?,
                })
            })
            .map_err(StorageError::read(SUMMARY_TABLE))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::read(SUMMARY_TABLE))
    }

    /// Every collection action in append order.
    pub fn read_session_log(&self) -> Vec<SessionLogEntry> {
        self.try_read_session_log().unwrap_or_else(|e| {
            warn!("No session log read: {}", e);
            Vec::new()
        })
    }

    fn try_read_session_log(&self) -> Result<Vec<SessionLogEntry>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT platform, query, items_collected, extraction_time
                 FROM session_log ORDER BY id",
            )
            .map_err(StorageError::read(SESSION_TABLE))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SessionLogEntry {
                    platform: row.get("platform")?,
                    query: row.get("query")?,
                    items_collected: row.get("items_collected")?,
                    extraction_time: timestamp(row, "extraction_time")?,
                })
            })
            .map_err(StorageError::read(SESSION_TABLE))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::read(SESSION_TABLE))
    }

    /// Number of rows in a partition; 0 if it cannot be read.
    pub fn row_count(&self, platform: Platform) -> i64 {
        self.conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", platform.table()),
                [],
                |row| row.get(0),
            )
            .unwrap_or(0)
    }

    /// Size of the database in bytes, from SQLite's page accounting.
    pub fn file_size_bytes(&self) -> i64 {
        let page_count: i64 = self
            .conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap_or(0);
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .unwrap_or(0);
        page_count * page_size
    }

    /// Size of the write-ahead log next to the store file. 0 when there is
    /// none, as for in-memory stores.
    pub fn wal_size_bytes(&self) -> u64 {
        let mut wal = self.path.clone().into_os_string();
        wal.push("-wal");
        std::fs::metadata(wal).map(|m| m.len()).unwrap_or(0)
    }
}

fn insert_partition(
    conn: &Connection,
    platform: Platform,
    batch: &[&ScoredRecord],
    ingested_at: i64,
) -> Result<(), StorageError> {
    let table = platform.table();
    let mut stmt = conn
        .prepare(&format!(
            "INSERT INTO {table} (
                id, title, text, author, created_utc, score, num_comments, url,
                title_clean, text_clean, full_text, sentiment_score, sentiment_label, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ))
        .map_err(StorageError::write(table))?;

    for record in batch {
        let raw = record.raw();
        let normalized = &record.normalized;
        stmt.execute(params![
            raw.id,
            raw.title,
            raw.text,
            raw.author,
            raw.created_utc.timestamp(),
            raw.score,
            raw.num_comments,
            raw.url,
            normalized.title_clean,
            normalized.text_clean,
            normalized.full_text,
            finite("sentiment_score", record.sentiment_score)?,
            record.sentiment_label,
            ingested_at,
        ])
        .map_err(StorageError::write(table))?;
    }

    Ok(())
}

/// Keep only the earliest stored row for each id. Returns rows removed.
fn collapse_duplicates(conn: &Connection, platform: Platform) -> Result<usize, StorageError> {
    let table = platform.table();
    conn.execute(
        &format!(
            "DELETE FROM {table}
             WHERE row_seq NOT IN (SELECT MIN(row_seq) FROM {table} GROUP BY id)"
        ),
        [],
    )
    .map_err(StorageError::write(table))
}

fn append_summaries(
    conn: &Connection,
    records: &[ScoredRecord],
    created_at: i64,
) -> Result<Vec<SummaryStat>, StorageError> {
    let summaries = summarize_batch(records);

    let mut stmt = conn
        .prepare(
            "INSERT INTO summary_stats (
                platform, total_posts, avg_sentiment, positive_count, negative_count,
                neutral_count, avg_score, avg_comments, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .map_err(StorageError::write(SUMMARY_TABLE))?;

    for stat in &summaries {
        stmt.execute(params![
            stat.platform,
            stat.total_posts,
            finite("avg_sentiment", stat.avg_sentiment)?,
            stat.positive_count,
            stat.negative_count,
            stat.neutral_count,
            finite("avg_score", stat.avg_score)?,
            finite("avg_comments", stat.avg_comments)?,
            created_at,
        ])
        .map_err(StorageError::write(SUMMARY_TABLE))?;
    }

    Ok(summaries)
}

// SQLite stores NaN as NULL; reject it before it gets that far
fn finite(column: &'static str, value: f64) -> Result<f64, StorageError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(StorageError::NonNumeric { column, value })
    }
}

fn timestamp(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(column)?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::IntegralValueOutOfRange(index, secs)
    })
}

/// Path for a new store in `dir` named after `stamp`. A numeric suffix is
/// added when a store with that name already exists.
pub fn fresh_store_path(dir: &Path, stamp: NaiveDateTime) -> PathBuf {
    let base = format!("{}{}", STORE_PREFIX, stamp.format("%Y%m%d_%H%M%S"));
    let mut candidate = dir.join(format!("{base}.db"));
    let mut suffix = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{base}_{suffix}.db"));
        suffix += 1;
    }
    candidate
}

fn is_store_file(path: &Path) -> bool {
    path.is_file()
        && path.extension().is_some_and(|ext| ext == "db")
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(STORE_PREFIX))
}

/// Creation stamp and collision suffix of a store name, so `_10` sorts
/// after `_9` within the same second.
fn store_order_key(path: &Path) -> (String, u64) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let stamp = stem.strip_prefix(STORE_PREFIX).unwrap_or(stem);
    let mut parts = stamp.splitn(3, '_');
    let date = parts.next().unwrap_or_default();
    let time = parts.next().unwrap_or_default();
    let collision = parts.next().and_then(|n| n.parse().ok()).unwrap_or(0);
    (format!("{date}_{time}"), collision)
}

/// Run-stores in `dir`, most recent first. A missing directory has none.
pub fn list_stores<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, StorageError> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut stores = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if is_store_file(&path) {
            stores.push(path);
        }
    }
    stores.sort_by_cached_key(|path| Reverse(store_order_key(path)));
    Ok(stores)
}

/// Most recent run-store in `dir`, if any.
pub fn latest_store<P: AsRef<Path>>(dir: P) -> Result<Option<PathBuf>, StorageError> {
    Ok(list_stores(dir)?.into_iter().next())
}
