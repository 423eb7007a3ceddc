//! Normalized entity structs.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::search::normalize::parse_timestamp;

/// Metadata keys recognised on index entries.
///
/// Content entries (one per post) carry `title`, `subtitle`, `dt_published`
/// and `base_url`. Feed entries (one per site) carry `title`, `owner_name`,
/// `short_summary` and `baseurl`.
pub mod keys {
    pub const TITLE: &str = "title";
    pub const SUBTITLE: &str = "subtitle";
    pub const PUBLISHED: &str = "dt_published";
    pub const CONTENT_BASE_URL: &str = "base_url";

    pub const OWNER_NAME: &str = "owner_name";
    pub const SHORT_SUMMARY: &str = "short_summary";
    pub const FEED_BASE_URL: &str = "baseurl";
}

/// Typed read-only view over the metadata map an index match carries.
///
/// Values of the wrong JSON type read as absent rather than as an empty
/// string, so callers decide their own fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and fixtures.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// String field, `None` when missing or not a string.
    pub fn string(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// String field with empty-string fallback.
    pub fn string_or_empty(&self, key: &str) -> &str {
        self.string(key).unwrap_or("")
    }

    /// Parsed timestamp field, `None` when missing or unparseable.
    pub fn date(&self, key: &str) -> Option<DateTime<FixedOffset>> {
        self.string(key).and_then(parse_timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One raw hit returned by the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Most recent post of a feed, attached during enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestPost {
    #[serde(rename = "latest_post_title")]
    pub title: String,
    #[serde(rename = "latest_post_url")]
    pub url: String,
    #[serde(rename = "latest_post_date")]
    pub date: String,
    #[serde(rename = "latest_post_snippet")]
    pub snippet: String,
}

/// One normalized search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub subtitle: String,
    /// `YYYY-MM-DD` or empty.
    pub date: String,
    #[serde(rename = "pcscore")]
    pub score: f32,
    #[serde(rename = "basedomain")]
    pub base_domain: String,
    #[serde(rename = "is_feed_search")]
    pub is_feed: bool,
    /// Only set for feed-schema results.
    pub rss_url: String,
    pub original_domain: String,
    #[serde(flatten)]
    pub latest_post: Option<LatestPost>,
}

/// Body of the JSON search API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// Seconds.
    pub time_taken: f64,
    pub total_results: usize,
}

impl SearchResponse {
    pub fn new(results: Vec<SearchResult>, time_taken: f64) -> Self {
        let total_results = results.len();
        Self {
            results,
            time_taken,
            total_results,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}
