//! Configuration loading and management

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::filter::DEFAULT_MIN_TEXT_LEN;

/// Environment variable that overrides `youtube.api_key`.
pub const YOUTUBE_API_KEY_ENV: &str = "YOUTUBE_API_KEY";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub collector: CollectorConfig,
    pub youtube: YoutubeConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub user_agent: String,
    pub rate_limit_per_second: u32,
    pub request_timeout_seconds: u64,
    /// Items collected per platform when the command line does not say
    pub default_limit: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            user_agent: "social-sentiment/0.1 (sentiment research)".to_string(),
            rate_limit_per_second: 1,
            request_timeout_seconds: 30,
            default_limit: 50,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub min_text_len: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_text_len: DEFAULT_MIN_TEXT_LEN,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the `social_media_*.db` run-stores
    pub store_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let mut config = Self::default();
            config.apply_env();
            Ok(config)
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(YOUTUBE_API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.youtube.api_key = Some(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.pipeline.min_text_len, 10);
        assert_eq!(config.collector.rate_limit_per_second, 1);
        assert_eq!(config.collector.default_limit, 50);
        assert_eq!(config.storage.store_dir, PathBuf::from("."));
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [collector]
            user_agent = "tester/1.0"
            default_limit = 200

            [pipeline]
            min_text_len = 20

            [storage]
            store_dir = "data/runs"
            "#,
        )
        .unwrap();
        assert_eq!(config.collector.user_agent, "tester/1.0");
        assert_eq!(config.collector.default_limit, 200);
        assert_eq!(config.collector.request_timeout_seconds, 30);
        assert_eq!(config.pipeline.min_text_len, 20);
        assert_eq!(config.storage.store_dir, PathBuf::from("data/runs"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default("definitely/not/here.toml").unwrap();
        assert_eq!(config.pipeline.min_text_len, 10);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(Config::from_toml("[pipeline]\nmin_text_len = \"ten\"").is_err());
    }
}
