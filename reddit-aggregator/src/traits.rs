use crate::types::AggregatedContent;
use async_trait::async_trait;

/// Trait for pulling a day's discussion from a community feed
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Human-readable name for this source
    fn source_name(&self) -> String;

    /// Collect the top threads with their top replies.
    ///
    /// Never fails: a unit that cannot be fetched or parsed contributes
    /// nothing and collection carries on.
    async fn collect(&self, limit_threads: usize, limit_replies: usize) -> AggregatedContent;
}
