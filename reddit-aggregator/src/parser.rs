//! Decoding of the feed's listing JSON into [`Thread`]s and [`Reply`]s.
//!
//! Every field is optional on the wire. Missing text becomes an empty
//! string, a missing author becomes `unknown`, a missing score 0 and a
//! missing timestamp the Unix epoch.

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::types::{AggregatorError, Reply, Result, Thread};

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:[a-zA-Z]|[0-9]|[$-_@.&+]|[!*\(\),]|(?:%[0-9a-fA-F][0-9a-fA-F]))+")
        .expect("URL pattern is valid")
});

const UNKNOWN_AUTHOR: &str = "unknown";

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    #[serde(default = "Vec::new")]
    children: Vec<Child<T>>,
}

#[derive(Debug, Deserialize)]
struct Child<T> {
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPost {
    id: Option<String>,
    title: Option<String>,
    author: Option<String>,
    score: Option<i64>,
    permalink: Option<String>,
    url: Option<String>,
    selftext: Option<String>,
    created_utc: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawComment {
    author: Option<String>,
    body: Option<String>,
    score: Option<i64>,
    created_utc: Option<f64>,
}

/// Decodes a `top.json` listing, in arrival order.
pub fn parse_top_listing(value: Value, feed_domain: &str) -> Result<Vec<Thread>> {
    let listing: Listing<RawPost> = serde_json::from_value(value)
        .map_err(|e| AggregatorError::Parse(format!("top listing: {}", e)))?;

    Ok(listing
        .data
        .children
        .into_iter()
        .filter_map(|child| child.data)
        .map(|post| thread_from_raw(post, feed_domain))
        .collect())
}

/// Decodes a `comments/{id}.json` response: a two element array whose
/// second listing holds the top-level replies. Nodes without a body
/// (such as "load more" stubs) are dropped.
pub fn parse_comments(value: Value) -> Result<Vec<Reply>> {
    let listing = match value {
        Value::Array(mut parts) if parts.len() > 1 => parts.swap_remove(1),
        _ => {
            return Err(AggregatorError::Parse(
                "comments response is not a [post, comments] pair".to_string(),
            ))
        }
    };
    let listing: Listing<RawComment> = serde_json::from_value(listing)
        .map_err(|e| AggregatorError::Parse(format!("comment listing: {}", e)))?;

    Ok(listing
        .data
        .children
        .into_iter()
        .filter_map(|child| child.data)
        .filter_map(reply_from_raw)
        .collect())
}

fn thread_from_raw(post: RawPost, feed_domain: &str) -> Thread {
    let permalink = post.permalink.unwrap_or_default();
    Thread {
        id: post.id.unwrap_or_default(),
        title: post.title.unwrap_or_default(),
        author: post.author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        popularity_score: post.score.unwrap_or(0),
        canonical_url: format!("https://{}{}", feed_domain, permalink),
        external_url: post.url.and_then(|url| external_url(&url, feed_domain)),
        body_text: post.selftext.filter(|text| !text.is_empty()),
        created_at: timestamp(post.created_utc),
        replies: Vec::new(),
    }
}

fn reply_from_raw(comment: RawComment) -> Option<Reply> {
    let body = comment.body?;
    Some(Reply {
        author: comment.author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        mentioned_urls: extract_urls(&body),
        body_text: body,
        popularity_score: comment.score.unwrap_or(0),
        created_at: timestamp(comment.created_utc),
    })
}

fn timestamp(created_utc: Option<f64>) -> DateTime<Utc> {
    let secs = created_utc.unwrap_or(0.0) as i64;
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

/// All http(s) URLs in `text`, in order of first occurrence, duplicates kept.
pub fn extract_urls(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Returns `url` unless it is unparseable or points at `feed_domain` or one
/// of its subdomains.
pub fn external_url(url: &str, feed_domain: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let domain = feed_domain.to_ascii_lowercase();
    if host == domain || host.ends_with(&format!(".{}", domain)) {
        None
    } else {
        Some(url.to_string())
    }
}
