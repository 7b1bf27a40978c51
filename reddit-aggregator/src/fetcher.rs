use crate::types::{AggregatorError, FetchConfig, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Thin JSON client for the feed's read API.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn community_url(&self) -> String {
        format!(
            "{}/r/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.subreddit
        )
    }

    /// Top threads of the current day window.
    pub fn top_listing_url(&self, limit: usize) -> String {
        format!("{}/top.json?t=day&limit={}", self.community_url(), limit)
    }

    pub fn comments_url(&self, thread_id: &str) -> String {
        format!("{}/comments/{}.json", self.community_url(), thread_id)
    }

    /// GETs `url` and decodes the body as JSON. Any status other than 200 is an error.
    pub async fn get_json(&self, url: &str) -> Result<Value> {
        let start_time = Instant::now();
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(AggregatorError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let value = serde_json::from_str(&body)?;
        info!(
            "Fetched {} ({} bytes in {} ms)",
            url,
            body.len(),
            start_time.elapsed().as_millis()
        );
        Ok(value)
    }
}
