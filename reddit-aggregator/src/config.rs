use std::path::PathBuf;
use std::time::Duration;

use email_delivery::{parse_recipients, SmtpConfig};

use crate::llm_adapter::ProviderConfig;
use crate::prompt::PromptBuilder;
use crate::types::{AggregatorError, FetchConfig, Result};

const DEFAULT_PROVIDER_URL: &str = "https://api.deepseek.com";
const DEFAULT_MODEL: &str = "deepseek-chat";
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);

/// Where the newsletter goes.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub smtp: SmtpConfig,
    pub recipients: Vec<String>,
}

/// Everything one run needs, resolved from environment-style keys.
#[derive(Debug, Clone)]
pub struct NewsletterConfig {
    pub feed: FetchConfig,
    pub post_limit: usize,
    pub comments_per_post: usize,
    pub primary: ProviderConfig,
    pub backup: Option<ProviderConfig>,
    pub title: String,
    pub language: String,
    pub sections: (u8, u8),
    pub snapshot_path: PathBuf,
    /// Absent for runs that stop after generation.
    pub delivery: Option<DeliveryConfig>,
}

impl NewsletterConfig {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env(deliver: bool) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok(), deliver)
    }

    /// Resolves the configuration from `lookup`. Blank values count as unset.
    /// SMTP settings and a non-empty `EMAIL_TO` are only required when `deliver` is set.
    pub fn from_lookup<F>(lookup: F, deliver: bool) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| AggregatorError::Config(format!("{} environment variable not set", key)))
        };

        let mut feed = FetchConfig::for_subreddit(require("REDDIT_SUBREDDIT")?);
        if let Some(base_url) = get("REDDIT_BASE_URL") {
            feed.base_url = base_url;
        }
        if let Some(user_agent) = get("REDDIT_USER_AGENT") {
            feed.user_agent = user_agent;
        }
        feed.pacing = Duration::from_millis(parse_or(get("FETCH_PACING_MS"), "FETCH_PACING_MS", 1000)?);

        let temperature = parse_or(get("LLM_TEMPERATURE"), "LLM_TEMPERATURE", 0.7f32)?;
        let primary = ProviderConfig {
            name: "primary".to_string(),
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
            api_key: require("OPENAI_API_KEY")?,
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            timeout: PROVIDER_TIMEOUT,
        };
        let backup = get("BACKUP_API_KEY").map(|api_key| ProviderConfig {
            name: "backup".to_string(),
            base_url: get("BACKUP_BASE_URL").unwrap_or_else(|| primary.base_url.clone()),
            api_key,
            model: get("BACKUP_MODEL").unwrap_or_else(|| primary.model.clone()),
            temperature,
            timeout: PROVIDER_TIMEOUT,
        });

        let delivery = if deliver {
            let recipients = parse_recipients(&get("EMAIL_TO").unwrap_or_default());
            if recipients.is_empty() {
                return Err(AggregatorError::Config("EMAIL_TO lists no recipients".to_string()).into());
            }
            Some(DeliveryConfig {
                smtp: SmtpConfig::from_lookup(&lookup)?,
                recipients,
            })
        } else {
            None
        };

        Ok(Self {
            feed,
            post_limit: parse_or(get("POST_LIMIT"), "POST_LIMIT", 20)?,
            comments_per_post: parse_or(get("COMMENTS_PER_POST"), "COMMENTS_PER_POST", 5)?,
            primary,
            backup,
            title: get("NEWSLETTER_TITLE").unwrap_or_else(|| "LocalLLaMA Community Newsletter".to_string()),
            language: get("NEWSLETTER_LANGUAGE").unwrap_or_else(|| "English".to_string()),
            sections: (
                parse_or(get("NEWSLETTER_SECTIONS_MIN"), "NEWSLETTER_SECTIONS_MIN", 5)?,
                parse_or(get("NEWSLETTER_SECTIONS_MAX"), "NEWSLETTER_SECTIONS_MAX", 7)?,
            ),
            snapshot_path: get("SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("reddit_content.json")),
            delivery,
        })
    }

    pub fn prompt_builder(&self) -> PromptBuilder {
        PromptBuilder::new(&self.title, &self.language, self.sections.0, self.sections.1)
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .parse()
            .map_err(|e| AggregatorError::Config(format!("{} has an invalid value '{}': {}", key, value, e))),
        None => Ok(default),
    }
}
