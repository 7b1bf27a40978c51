use std::time::Duration;

// Use the interfaces crate for core types
pub use interfaces::defs::{AggregatedContent, DeliveryReport, GenerationOutcome, Reply, Thread};

/// Where and how the community feed is read.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub subreddit: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Fixed wait after each thread's reply fetch.
    pub pacing: Duration,
    /// Host the feed lives on; links to it or its subdomains are not external.
    pub feed_domain: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.reddit.com".to_string(),
            subreddit: "LocalLLaMA".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            timeout_seconds: 30,
            pacing: Duration::from_secs(1),
            feed_domain: "reddit.com".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn for_subreddit(subreddit: impl Into<String>) -> Self {
        Self {
            subreddit: subreddit.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
