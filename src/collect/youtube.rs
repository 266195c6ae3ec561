//! YouTube collector.
//!
//! Finds the top video for a search term through the Data API v3 and pages
//! through its top-level comment threads.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Collector, HttpSession};
use crate::config::{CollectorConfig, YoutubeConfig, YOUTUBE_API_KEY_ENV};
use crate::error::CollectError;
use crate::models::{Platform, RawInput, RawTimestamp};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const MAX_PAGE_SIZE: usize = 100;

/// Collects comments from the top video matching a search term
pub struct YoutubeCollector {
    session: HttpSession,
    api_key: String,
}

impl YoutubeCollector {
    pub fn new(config: &CollectorConfig, youtube: &YoutubeConfig) -> Result<Self, CollectError> {
        let api_key = youtube
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                CollectError::Config(format!(
                    "no YouTube API key; set youtube.api_key or {}",
                    YOUTUBE_API_KEY_ENV
                ))
            })?;

        Ok(Self {
            session: HttpSession::new(config)?,
            api_key,
        })
    }

    async fn find_video(&self, query: &str) -> Result<Option<Video>, CollectError> {
        let params = [
            ("part", "snippet".to_string()),
            ("q", query.to_string()),
            ("maxResults", "1".to_string()),
            ("type", "video".to_string()),
            ("key", self.api_key.clone()),
        ];
        let response: SearchResponse = self
            .session
            .get_json(&format!("{}/search", API_BASE), &params)
            .await?;
        Ok(response.first_video())
    }
}

#[async_trait]
impl Collector for YoutubeCollector {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn collect(&self, query: &str, limit: usize) -> Result<Vec<RawInput>, CollectError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let Some(video) = self.find_video(query).await? else {
            info!("No YouTube video found for {:?}", query);
            return Ok(Vec::new());
        };
        info!("Collecting comments from {:?} ({})", video.title, video.id);

        let url = format!("{}/commentThreads", API_BASE);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        while items.len() < limit {
            let page_size = (limit - items.len()).min(MAX_PAGE_SIZE);
            let mut params = vec![
                ("part", "snippet".to_string()),
                ("videoId", video.id.clone()),
                ("textFormat", "plainText".to_string()),
                ("maxResults", page_size.to_string()),
                ("key", self.api_key.clone()),
            ];
            if let Some(ref token) = page_token {
                params.push(("pageToken", token.clone()));
            }

            debug!("Fetching comment page {:?} for {}", page_token, video.id);
            let page: CommentThreadsResponse = self.session.get_json(&url, &params).await?;

            let received = page.items.len();
            items.extend(page.items.into_iter().map(|t| t.into_raw(&video.id)));

            match page.next_page_token {
                Some(token) if received > 0 => page_token = Some(token),
                _ => break,
            }
        }

        items.truncate(limit);
        Ok(items)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Video {
    id: String,
    title: String,
}

// === API Response Types ===

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

impl SearchResponse {
    fn first_video(self) -> Option<Video> {
        self.items.into_iter().find_map(|item| {
            item.id.video_id.map(|id| Video {
                id,
                title: item.snippet.map(|s| s.title).unwrap_or_default(),
            })
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    #[serde(default)]
    snippet: Option<VideoSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadsResponse {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<CommentThread>,
}

#[derive(Debug, Deserialize)]
struct CommentThread {
    id: String,
    snippet: ThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadSnippet {
    top_level_comment: TopLevelComment,
    #[serde(default)]
    total_reply_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    #[serde(default)]
    text_display: Option<String>,
    #[serde(default)]
    author_display_name: Option<String>,
    #[serde(default)]
    like_count: Option<i64>,
    #[serde(default)]
    published_at: Option<String>,
}

impl CommentThread {
    fn into_raw(self, video_id: &str) -> RawInput {
        let comment = self.snippet.top_level_comment.snippet;
        let url = format!("https://youtube.com/watch?v={}&lc={}", video_id, self.id);
        RawInput {
            id: Some(self.id),
            platform: Some(Platform::Youtube.as_str().to_string()),
            title: None, // comments have no title
            text: comment.text_display,
            author: comment.author_display_name,
            created_utc: comment.published_at.map(RawTimestamp::Text),
            score: comment.like_count,
            num_comments: self.snippet.total_reply_count,
            url: Some(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRecord;

    #[test]
    fn test_missing_api_key_is_config_error() {
        let result = YoutubeCollector::new(
            &CollectorConfig::default(),
            &YoutubeConfig { api_key: Some("  ".into()) },
        );
        assert!(matches!(result, Err(CollectError::Config(_))));
    }

    #[test]
    fn test_search_picks_first_video() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"items": [
                {"id": {"kind": "youtube#channel", "channelId": "UC1"}},
                {"id": {"kind": "youtube#video", "videoId": "vid42"},
                 "snippet": {"title": "Machine learning in 10 minutes"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            response.first_video(),
            Some(Video {
                id: "vid42".into(),
                title: "Machine learning in 10 minutes".into(),
            })
        );

        let empty: SearchResponse = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert_eq!(empty.first_video(), None);
    }

    #[test]
    fn test_comment_threads_map_to_raw_records() {
        let page: CommentThreadsResponse = serde_json::from_str(
            r#"{
                "nextPageToken": "QURTSl9p",
                "items": [{
                    "id": "Ugx1",
                    "snippet": {
                        "videoId": "vid42",
                        "topLevelComment": {"id": "Ugx1", "snippet": {
                            "textDisplay": "Great explanation, thanks!",
                            "authorDisplayName": "@viewer",
                            "likeCount": 12,
                            "publishedAt": "2023-11-14T22:13:20Z"
                        }},
                        "totalReplyCount": 3
                    }
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("QURTSl9p"));

        let raw = page.items.into_iter().next().unwrap().into_raw("vid42");
        assert_eq!(raw.url.as_deref(), Some("https://youtube.com/watch?v=vid42&lc=Ugx1"));

        let record = RawRecord::try_from(raw).unwrap();
        assert_eq!(record.platform, Platform::Youtube);
        assert_eq!(record.title, "");
        assert_eq!(record.score, 12);
        assert_eq!(record.num_comments, 3);
        assert_eq!(record.created_utc.timestamp(), 1_700_000_000);
    }
}
