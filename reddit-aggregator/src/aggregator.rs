use crate::fetcher::Fetcher;
use crate::parser::{parse_comments, parse_top_listing};
use crate::traits::ContentSource;
use crate::types::{AggregatedContent, FetchConfig, Reply, Result, Thread};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

/// Collects a subreddit's top daily threads and their top replies.
pub struct RedditSource {
    fetcher: Fetcher,
}

impl RedditSource {
    pub fn new(config: FetchConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(config)?,
        })
    }

    /// Top threads for the day, ranked by descending score.
    /// Returns an empty list if the listing cannot be fetched or decoded.
    pub async fn fetch_top_threads(&self, limit: usize) -> Vec<Thread> {
        let url = self.fetcher.top_listing_url(limit);
        let result = match self.fetcher.get_json(&url).await {
            Ok(value) => parse_top_listing(value, &self.fetcher.config().feed_domain),
            Err(e) => Err(e),
        };

        match result {
            Ok(mut threads) => {
                threads.sort_by(|a, b| b.popularity_score.cmp(&a.popularity_score));
                info!("Fetched {} top threads from r/{}", threads.len(), self.fetcher.config().subreddit);
                threads
            }
            Err(e) => {
                warn!("Error fetching top threads from {}: {}", url, e);
                Vec::new()
            }
        }
    }

    /// Replies to one thread in arrival order. Empty on any failure.
    pub async fn fetch_replies(&self, thread_id: &str) -> Vec<Reply> {
        let url = self.fetcher.comments_url(thread_id);
        let result = match self.fetcher.get_json(&url).await {
            Ok(value) => parse_comments(value),
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!("Error fetching replies for thread {}: {}", thread_id, e);
            Vec::new()
        })
    }
}

#[async_trait]
impl ContentSource for RedditSource {
    fn source_name(&self) -> String {
        self.fetcher.config().subreddit.clone()
    }

    async fn collect(&self, limit_threads: usize, limit_replies: usize) -> AggregatedContent {
        let pacing = self.fetcher.config().pacing;
        let mut threads = self.fetch_top_threads(limit_threads).await;

        for thread in threads.iter_mut() {
            let replies = self.fetch_replies(&thread.id).await;
            thread.attach_replies(replies, limit_replies);
            info!(
                "Thread {} ({} points): kept {} replies",
                thread.id,
                thread.popularity_score,
                thread.replies.len()
            );
            tokio::time::sleep(pacing).await;
        }

        let content = AggregatedContent::new(self.source_name(), Utc::now().date_naive(), threads);
        info!(
            "Collected {} threads and {} replies from r/{}",
            content.threads.len(),
            content.reply_count(),
            content.source_name
        );
        content
    }
}
