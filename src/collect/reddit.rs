//! Reddit collector using the public listing JSON of a subreddit's hot page.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Collector, HttpSession};
use crate::config::CollectorConfig;
use crate::error::CollectError;
use crate::models::{Platform, RawInput, RawTimestamp};

const API_BASE: &str = "https://www.reddit.com";
const MAX_PAGE_SIZE: usize = 100;

/// Collects hot posts from a subreddit
pub struct RedditCollector {
    session: HttpSession,
}

impl RedditCollector {
    pub fn new(config: &CollectorConfig) -> Result<Self, CollectError> {
        Ok(Self {
            session: HttpSession::new(config)?,
        })
    }
}

#[async_trait]
impl Collector for RedditCollector {
    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    async fn collect(&self, query: &str, limit: usize) -> Result<Vec<RawInput>, CollectError> {
        let subreddit = subreddit_name(query)
            .ok_or_else(|| CollectError::Config(format!("invalid subreddit {:?}", query)))?;
        let url = format!("{}/r/{}/hot.json", API_BASE, subreddit);

        let mut items = Vec::new();
        let mut after: Option<String> = None;

        while items.len() < limit {
            let page_size = (limit - items.len()).min(MAX_PAGE_SIZE);
            let mut params = vec![
                ("limit", page_size.to_string()),
                ("raw_json", "1".to_string()),
            ];
            if let Some(ref token) = after {
                params.push(("after", token.clone()));
            }

            debug!("Fetching r/{} page after {:?}", subreddit, after);
            let listing: Listing = self.session.get_json(&url, &params).await?;

            let received = listing.data.children.len();
            items.extend(listing.data.children.into_iter().map(|c| c.data.into_raw()));

            match listing.data.after {
                Some(token) if received > 0 => after = Some(token),
                _ => break,
            }
        }

        items.truncate(limit);
        Ok(items)
    }
}

/// Accepts `rust`, `r/rust` or `/r/rust/`.
fn subreddit_name(query: &str) -> Option<&str> {
    let name = query
        .trim()
        .trim_matches('/')
        .trim_start_matches("r/")
        .trim_matches('/');
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

// === API Response Types ===

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    after: Option<String>,
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    selftext: Option<String>,   // Body of a self post, empty for links
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    created_utc: Option<f64>,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    num_comments: Option<i64>,
    #[serde(default)]
    url: Option<String>,
}

impl Post {
    fn into_raw(self) -> RawInput {
        RawInput {
            id: Some(self.id),
            platform: Some(Platform::Reddit.as_str().to_string()),
            title: self.title,
            text: self.selftext,
            author: self.author,
            created_utc: self.created_utc.map(RawTimestamp::FractionalSeconds),
            score: self.score,
            num_comments: self.num_comments,
            url: self.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRecord;

    const LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_def456",
            "children": [
                {"kind": "t3", "data": {
                    "id": "abc123",
                    "title": "Which plotting library do you use?",
                    "selftext": "Looking for something better than matplotlib.",
                    "author": "curious_dev",
                    "created_utc": 1700000000.0,
                    "score": 42,
                    "num_comments": 17,
                    "url": "https://www.reddit.com/r/datascience/comments/abc123/",
                    "stickied": false
                }},
                {"kind": "t3", "data": {
                    "id": "def456",
                    "title": "Link post",
                    "selftext": "",
                    "author": "[deleted]",
                    "created_utc": 1700000500.5,
                    "score": -2,
                    "num_comments": 0,
                    "url": "https://example.com/article"
                }}
            ]
        }
    }"#;

    #[test]
    fn test_listing_maps_to_raw_records() {
        let listing: Listing = serde_json::from_str(LISTING).unwrap();
        assert_eq!(listing.data.after.as_deref(), Some("t3_def456"));

        let records: Vec<RawRecord> = listing
            .data
            .children
            .into_iter()
            .map(|c| RawRecord::try_from(c.data.into_raw()).unwrap())
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "abc123");
        assert_eq!(records[0].platform, Platform::Reddit);
        assert_eq!(records[0].num_comments, 17);
        assert_eq!(records[0].created_utc.timestamp(), 1_700_000_000);
        assert_eq!(records[1].score, -2);
        assert_eq!(records[1].text, "");
    }

    #[test]
    fn test_empty_listing() {
        let listing: Listing =
            serde_json::from_str(r#"{"kind": "Listing", "data": {"after": null}}"#).unwrap();
        assert!(listing.data.children.is_empty());
        assert!(listing.data.after.is_none());
    }

    #[test]
    fn test_subreddit_name() {
        assert_eq!(subreddit_name("datascience"), Some("datascience"));
        assert_eq!(subreddit_name("r/rust"), Some("rust"));
        assert_eq!(subreddit_name(" /r/learn_python/ "), Some("learn_python"));
        assert_eq!(subreddit_name(""), None);
        assert_eq!(subreddit_name("bad name"), None);
        assert_eq!(subreddit_name("../etc"), None);
    }
}
