//! Mapping raw index matches into [`SearchResult`]s, plus the date and URL
//! helpers the ranking passes share.

use std::cmp::Reverse;
use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use crate::model::types::{Match, SearchResult, keys};
use crate::search::query::StructuredQuery;

/// Timestamp layouts tried after RFC 3339. `%.f` makes fractional seconds optional.
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Canonical output layout for result dates.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which result schema the matches belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSchema {
    /// One entry per post.
    Content,
    /// One entry per site/feed.
    Feed,
}

impl ResultSchema {
    pub fn for_query(query: &StructuredQuery) -> Self {
        if query.targets_feeds {
            Self::Feed
        } else {
            Self::Content
        }
    }
}

/// Parse a provider or canonical date string.
///
/// Accepts RFC 3339 (with or without fractional seconds), `T`- or
/// space-separated date-times without zone (read as UTC) and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Canonicalize a date to `YYYY-MM-DD`.
///
/// Unparseable values with a date-shaped prefix keep their first ten
/// characters; anything else is returned unchanged.
pub fn canonical_date(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    if let Some(dt) = parse_timestamp(raw) {
        return dt.format(DATE_FORMAT).to_string();
    }
    let bytes = raw.as_bytes();
    if bytes.len() >= 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && let Some(prefix) = raw.get(..10)
    {
        return prefix.to_string();
    }
    raw.to_string()
}

/// Strip scheme, `www.` and trailing slashes from a URL.
///
/// Stripping repeats until nothing changes, so the result is a fixed point.
pub fn clean_url(url: &str) -> String {
    let mut current = url;
    loop {
        let next = current
            .strip_prefix("https://")
            .or_else(|| current.strip_prefix("http://"))
            .or_else(|| current.strip_prefix("www."))
            .unwrap_or(current)
            .trim_end_matches('/');
        if next.len() == current.len() {
            return next.to_string();
        }
        current = next;
    }
}

/// Map matches to results without reordering.
pub fn normalize(matches: &[Match], schema: ResultSchema) -> Vec<SearchResult> {
    matches
        .iter()
        .map(|m| match schema {
            ResultSchema::Feed => feed_result(m),
            ResultSchema::Content => content_result(m),
        })
        .collect()
}

fn feed_result(m: &Match) -> SearchResult {
    let meta = &m.metadata;
    let base_url = meta.string_or_empty(keys::FEED_BASE_URL);
    let title = meta
        .string(keys::OWNER_NAME)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| meta.string_or_empty(keys::TITLE));

    SearchResult {
        url: base_url.to_string(),
        title: title.to_string(),
        subtitle: meta.string_or_empty(keys::SHORT_SUMMARY).to_string(),
        date: String::new(),
        score: m.score,
        base_domain: clean_url(base_url),
        is_feed: true,
        rss_url: m.id.clone(),
        original_domain: base_url.to_string(),
        latest_post: None,
    }
}

fn content_result(m: &Match) -> SearchResult {
    let meta = &m.metadata;
    let base_url = meta.string_or_empty(keys::CONTENT_BASE_URL);

    SearchResult {
        url: m.id.clone(),
        title: meta.string_or_empty(keys::TITLE).to_string(),
        subtitle: meta.string_or_empty(keys::SUBTITLE).to_string(),
        date: canonical_date(meta.string_or_empty(keys::PUBLISHED)),
        score: m.score,
        base_domain: clean_url(base_url),
        is_feed: false,
        rss_url: String::new(),
        original_domain: base_url.to_string(),
        latest_post: None,
    }
}

/// Normalize matches for `query` and apply the single-site recency ordering.
///
/// Content searches scoped with `site:` are re-sorted by the raw publish
/// timestamp, newest first; undated entries sink to the end in provider order.
pub fn normalize_and_rank(matches: &[Match], query: &StructuredQuery) -> Vec<SearchResult> {
    let schema = ResultSchema::for_query(query);
    let results = normalize(matches, schema);

    if schema == ResultSchema::Feed || !query.has_site_filter() {
        return results;
    }

    let mut dated: Vec<_> = results
        .into_iter()
        .zip(matches)
        .map(|(result, m)| (m.metadata.date(keys::PUBLISHED), result))
        .collect();
    dated.sort_by(|a, b| b.0.cmp(&a.0));
    dated.into_iter().map(|(_, result)| result).collect()
}

/// Re-sort already normalized results by their `date`, newest first.
pub fn sort_results_by_date(results: &mut [SearchResult]) {
    results.sort_by_cached_key(|r| Reverse(parse_timestamp(&r.date)));
}

/// Drop results whose trimmed, lowercased title was already seen.
pub fn dedupe_by_title(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.title.trim().to_lowercase()))
        .collect()
}
