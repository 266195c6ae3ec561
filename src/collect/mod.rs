//! Platform collectors.
//!
//! Collectors fetch posts or comments from a platform API and hand them over
//! as [`RawInput`] values. They sit outside the core pipeline: a collector
//! that fails produces an empty batch, which the pipeline accepts like any
//! other.

pub mod reddit;
pub mod youtube;

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use tracing::{info, warn};

use crate::config::CollectorConfig;
use crate::error::CollectError;
use crate::models::{Platform, RawInput};

pub use reddit::RedditCollector;
pub use youtube::YoutubeCollector;

/// A source of raw records for one platform.
#[async_trait]
pub trait Collector: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetch up to `limit` items matching `query` (a subreddit, a search term).
    async fn collect(&self, query: &str, limit: usize) -> Result<Vec<RawInput>, CollectError>;
}

/// Run a collector, turning any failure into an empty batch.
pub async fn collect_or_empty(collector: &dyn Collector, query: &str, limit: usize) -> Vec<RawInput> {
    match collector.collect(query, limit).await {
        Ok(items) => {
            info!(
                "Collected {} {} items for {:?}",
                items.len(),
                collector.platform(),
                query
            );
            items
        }
        Err(e) => {
            warn!(
                "Collecting from {} for {:?} failed, continuing with an empty batch: {}",
                collector.platform(),
                query,
                e
            );
            Vec::new()
        }
    }
}

/// HTTP client and rate limiter shared by collectors.
pub(crate) struct HttpSession {
    pub(crate) client: Client,
    pub(crate) rate_limiter: DefaultDirectRateLimiter,
}

impl HttpSession {
    pub(crate) fn new(config: &CollectorConfig) -> Result<Self, CollectError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .gzip(true)
            .user_agent(config.user_agent.as_str())
            .build()?;

        let per_second = NonZeroU32::new(config.rate_limit_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// GET `url` with `query` once the rate limiter allows, decoding JSON.
    pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, CollectError> {
        self.rate_limiter.until_ready().await;

        let response = self.client.get(url).query(query).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "no response body".to_string());
            return Err(CollectError::Api(format!("{} returned {}: {}", url, status, body)));
        }

        Ok(response.json::<T>().await?)
    }
}
