use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One response attached to a [`Thread`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub author: String,
    pub body_text: String,
    pub popularity_score: i64,
    pub mentioned_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// One top-level discussion item from the community feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub author: String,
    pub popularity_score: i64,
    pub canonical_url: String,
    pub external_url: Option<String>,
    pub body_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub replies: Vec<Reply>,
}

impl Thread {
    /// Attaches replies ranked by descending score and capped at `cap`.
    /// Ties keep arrival order.
    pub fn attach_replies(&mut self, mut replies: Vec<Reply>, cap: usize) {
        replies.sort_by(|a, b| b.popularity_score.cmp(&a.popularity_score));
        replies.truncate(cap);
        self.replies = replies;
    }
}

/// The unit handed from collection to generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedContent {
    pub source_name: String,
    pub collection_date: NaiveDate,
    pub threads: Vec<Thread>,
}

impl AggregatedContent {
    pub fn new(source_name: impl Into<String>, collection_date: NaiveDate, mut threads: Vec<Thread>) -> Self {
        threads.sort_by(|a, b| b.popularity_score.cmp(&a.popularity_score));
        Self {
            source_name: source_name.into(),
            collection_date,
            threads,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn reply_count(&self) -> usize {
        self.threads.iter().map(|t| t.replies.len()).sum()
    }
}

pub const ALL_PROVIDERS_EXHAUSTED: &str = "all providers exhausted";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success(String),
    Failure(String),
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Success(text) => Some(text),
            GenerationOutcome::Failure(_) => None,
        }
    }
}

/// Per-recipient accounting for one delivery batch.
///
/// Every address recorded as succeeded is also recorded as attempted, so
/// `succeeded` is always a subset of `attempted`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    attempted: BTreeSet<String>,
    succeeded: BTreeSet<String>,
}

impl DeliveryReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, address: &str, delivered: bool) {
        self.attempted.insert(address.to_owned());
        if delivered {
            self.succeeded.insert(address.to_owned());
        }
    }

    pub fn attempted(&self) -> &BTreeSet<String> {
        &self.attempted
    }

    pub fn succeeded(&self) -> &BTreeSet<String> {
        &self.succeeded
    }

    pub fn failed(&self) -> impl Iterator<Item = &String> {
        self.attempted.difference(&self.succeeded)
    }

    /// True only when at least one recipient was attempted and all of them succeeded.
    pub fn is_complete(&self) -> bool {
        !self.attempted.is_empty() && self.attempted == self.succeeded
    }
}
