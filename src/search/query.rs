//! Query DSL parsing.
//!
//! A raw query such as `rust async type:blog since:last_week site:example.com`
//! is split into free text plus structured predicates in a single left-to-right
//! pass over whitespace-separated words. A key is recognised at the start of a
//! word or right after punctuation (`rust,type:blog`, `(lang:en)`); the
//! punctuation stays in the text. Recognised keys:
//!
//! | Key | Effect |
//! |-----|--------|
//! | `type:` | content-type predicate (`feeds`/`everything` only affect routing) |
//! | `sype:` | site-type one-of predicate |
//! | `oype:` | owner-type predicate (individual vs. not individual) |
//! | `since:` | recency predicate on the publish timestamp |
//! | `site:` | exact domain predicate (field depends on feed routing) |
//! | `lang:` | language predicate |
//! | `score:` | minimum quality score |
//! | `length:` | minimum content length |
//! | `like:` | similarity reference (domain or URL) |
//! | `sort:` | secondary sort modifier |
//! | `<...>` | negation text, carried but not applied |
//!
//! Parsing never fails. Words that look like a key but carry no usable value
//! stay in the free text untouched.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Placeholder text used when every word of the query was a filter.
pub const SENTINEL_TEXT: &str = "a";

/// Index metadata fields that predicates filter on.
pub mod fields {
    pub const RSS_TYPE: &str = "rsstype";
    pub const SITE_TYPE: &str = "site_type";
    pub const OWNER_TYPE: &str = "owner_type";
    pub const UNIX_TIME: &str = "unix_time";
    /// Site field in the feed namespace.
    pub const FEED_SITE: &str = "baseurl";
    /// Site field in the content namespace.
    pub const CONTENT_SITE: &str = "base_url";
    pub const LANG: &str = "lang";
    pub const SCORE: &str = "score";
    pub const LENGTH: &str = "length";
}

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    In,
    Gt,
}

impl FilterOp {
    /// Operator tag in the index provider's filter language.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::In => "$in",
            Self::Gt => "$gt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    List(Vec<String>),
    Int(i64),
    Float(f64),
}

/// A single `field <op> value` condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    pub field: &'static str,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Predicate {
    pub fn eq(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            op: FilterOp::Eq,
            value: FilterValue::Text(value.into()),
        }
    }

    pub fn ne(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            op: FilterOp::Ne,
            value: FilterValue::Text(value.into()),
        }
    }

    pub fn one_of(field: &'static str, values: Vec<String>) -> Self {
        Self {
            field,
            op: FilterOp::In,
            value: FilterValue::List(values),
        }
    }

    pub fn gt(field: &'static str, value: FilterValue) -> Self {
        Self {
            field,
            op: FilterOp::Gt,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Time,
    Other(String),
}

impl SortBy {
    fn from_value(value: &str) -> Self {
        if value == "time" {
            Self::Time
        } else {
            Self::Other(value.to_string())
        }
    }
}

/// Target of a `like:` modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeReference {
    /// Bare domain such as `example.com`.
    Domain(String),
    /// Absolute `http(s)://` URL of one content item.
    Url(String),
}

impl LikeReference {
    fn from_value(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::Domain(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Domain(s) | Self::Url(s) => s,
        }
    }
}

/// Parsed form of one raw query string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredQuery {
    /// Residual free text, or [`SENTINEL_TEXT`] when nothing remained.
    pub text: String,
    pub filters: Vec<Predicate>,
    pub sort_by: Option<SortBy>,
    /// Parsed from `<...>` but not applied anywhere yet.
    pub negation: Option<String>,
    pub like_reference: Option<LikeReference>,
    /// True when the query routes to the feed namespace (`type:feeds`).
    pub targets_feeds: bool,
}

impl StructuredQuery {
    /// True when the user supplied real free text (not the sentinel).
    pub fn has_free_text(&self) -> bool {
        !self.text.is_empty() && self.text != SENTINEL_TEXT
    }

    pub fn has_site_filter(&self) -> bool {
        self.filters
            .iter()
            .any(|p| p.field == fields::FEED_SITE || p.field == fields::CONTENT_SITE)
    }

    pub fn sorts_by_time(&self) -> bool {
        self.sort_by == Some(SortBy::Time)
    }
}

/// Parse a raw query, evaluating relative dates against the current time.
pub fn parse(raw: &str) -> StructuredQuery {
    parse_at(raw, Utc::now())
}

/// Parse a raw query, evaluating `since:` relative to `now`.
pub fn parse_at(raw: &str, now: DateTime<Utc>) -> StructuredQuery {
    let mut slots = Slots::default();
    let mut residual: Vec<&str> = Vec::new();
    let mut rest = raw;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());

        // A negation span may contain whitespace, so it is matched against the
        // rest of the query rather than the current word.
        if slots.negation.is_none()
            && let Some(open) = rest[..end].find('<')
            && let Some(close) = rest[open + 1..].find('>')
            && close > 0
        {
            slots.negation = Some(rest[open + 1..open + 1 + close].to_string());
            slots.scan_word(&rest[..open], &mut residual);
            rest = &rest[open + close + 2..];
            continue;
        }

        slots.scan_word(&rest[..end], &mut residual);
        rest = &rest[end..];
    }

    let targets_feeds =
        slots.content_type.as_deref() == Some("feeds") || raw.contains("type:feeds");
    let filters = slots.predicates(targets_feeds, now);

    let text = residual.join(" ");
    let text = if text.is_empty() {
        SENTINEL_TEXT.to_string()
    } else {
        text
    };

    StructuredQuery {
        text,
        filters,
        sort_by: slots.sort.as_deref().map(SortBy::from_value),
        negation: slots.negation,
        like_reference: slots.like.as_deref().map(LikeReference::from_value),
        targets_feeds,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Type,
    SiteType,
    OwnerType,
    Since,
    Site,
    Lang,
    Score,
    Length,
    Like,
    Sort,
}

/// Which characters of the text after `key:` belong to the value.
enum Shape {
    /// `[A-Za-z0-9_]+`
    Word,
    /// `[0-9.]+`
    Decimal,
    /// `[0-9]+`
    Digits,
    /// Everything up to the next whitespace.
    Rest,
}

impl Key {
    fn from_prefix(key: &str) -> Option<Self> {
        Some(match key {
            "type" => Self::Type,
            "sype" => Self::SiteType,
            "oype" => Self::OwnerType,
            "since" => Self::Since,
            "site" => Self::Site,
            "lang" => Self::Lang,
            "score" => Self::Score,
            "length" => Self::Length,
            "like" => Self::Like,
            "sort" => Self::Sort,
            _ => return None,
        })
    }

    fn shape(self) -> Shape {
        match self {
            Self::Type | Self::SiteType | Self::OwnerType | Self::Since => Shape::Word,
            Self::Score => Shape::Decimal,
            Self::Length => Shape::Digits,
            Self::Site | Self::Lang | Self::Like | Self::Sort => Shape::Rest,
        }
    }
}

enum Consumed<'a> {
    All,
    /// Key and value consumed, trailing characters stay in the text.
    Partial(&'a str),
    Nothing,
}

/// Raw values captured during the scan; the first occurrence of a key wins.
#[derive(Default)]
struct Slots {
    content_type: Option<String>,
    site_type: Option<String>,
    owner_type: Option<String>,
    since: Option<String>,
    site: Option<String>,
    lang: Option<String>,
    score: Option<f64>,
    length: Option<i64>,
    like: Option<String>,
    sort: Option<String>,
    negation: Option<String>,
}

/// True when a key may start right after `head`: at the start of a word or
/// after punctuation such as `,` or `(`.
fn at_key_boundary(head: &str) -> bool {
    head.chars()
        .next_back()
        .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
}

impl Slots {
    /// Consume every key found in `word`, pushing the leftover pieces to
    /// `residual`.
    fn scan_word<'a>(&mut self, word: &'a str, residual: &mut Vec<&'a str>) {
        if word.is_empty() {
            return;
        }
        for (start, _) in word.char_indices() {
            let (head, candidate) = word.split_at(start);
            if !at_key_boundary(head) {
                continue;
            }
            match self.consume(candidate) {
                Consumed::Nothing => continue,
                Consumed::All => {
                    if !head.is_empty() {
                        residual.push(head);
                    }
                    return;
                }
                Consumed::Partial(tail) => {
                    if !head.is_empty() {
                        residual.push(head);
                    }
                    self.scan_word(tail, residual);
                    return;
                }
            }
        }
        residual.push(word);
    }

    fn consume<'a>(&mut self, word: &'a str) -> Consumed<'a> {
        let Some((prefix, after)) = word.split_once(':') else {
            return Consumed::Nothing;
        };
        let Some(key) = Key::from_prefix(prefix) else {
            return Consumed::Nothing;
        };

        let len = match key.shape() {
            Shape::Word => after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len()),
            Shape::Decimal => after
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(after.len()),
            Shape::Digits => after
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after.len()),
            Shape::Rest => after.len(),
        };
        if len == 0 {
            return Consumed::Nothing;
        }
        let (value, tail) = after.split_at(len);

        match key {
            Key::Score => match value.parse::<f64>() {
                Ok(v) => {
                    self.score.get_or_insert(v);
                }
                Err(_) => return Consumed::Nothing,
            },
            Key::Length => match value.parse::<i64>() {
                Ok(v) => {
                    self.length.get_or_insert(v);
                }
                Err(_) => return Consumed::Nothing,
            },
            Key::Type => {
                self.content_type.get_or_insert_with(|| value.to_string());
            }
            Key::SiteType => {
                self.site_type.get_or_insert_with(|| value.to_string());
            }
            Key::OwnerType => {
                self.owner_type.get_or_insert_with(|| value.to_string());
            }
            Key::Since => {
                self.since.get_or_insert_with(|| value.to_string());
            }
            Key::Site => {
                self.site.get_or_insert_with(|| value.to_string());
            }
            Key::Lang => {
                self.lang.get_or_insert_with(|| value.to_string());
            }
            Key::Like => {
                self.like.get_or_insert_with(|| value.to_string());
            }
            Key::Sort => {
                self.sort.get_or_insert_with(|| value.to_string());
            }
        }

        if tail.is_empty() {
            Consumed::All
        } else {
            Consumed::Partial(tail)
        }
    }

    /// Predicates in fixed precedence order.
    fn predicates(&self, targets_feeds: bool, now: DateTime<Utc>) -> Vec<Predicate> {
        let mut out = Vec::new();

        if let Some(t) = self.content_type.as_deref()
            && t != "everything"
            && t != "feeds"
        {
            out.push(Predicate::eq(fields::RSS_TYPE, content_type_mapping(t)));
        }

        if let Some(s) = self.site_type.as_deref()
            && s != "everything"
        {
            out.push(Predicate::one_of(fields::SITE_TYPE, site_type_mapping(s)));
        }

        if let Some(o) = self.owner_type.as_deref()
            && o != "everything"
        {
            if o == "individual" {
                out.push(Predicate::eq(fields::OWNER_TYPE, "individual"));
            } else {
                out.push(Predicate::ne(fields::OWNER_TYPE, "individual"));
            }
        }

        if let Some(days) = self.since.as_deref().and_then(since_days) {
            let cutoff = now.timestamp() - days * SECONDS_PER_DAY;
            out.push(Predicate::gt(fields::UNIX_TIME, FilterValue::Int(cutoff)));
        }

        if let Some(site) = self.site.as_deref() {
            let field = if targets_feeds {
                fields::FEED_SITE
            } else {
                fields::CONTENT_SITE
            };
            out.push(Predicate::eq(field, site));
        }

        if let Some(lang) = self.lang.as_deref() {
            out.push(Predicate::eq(fields::LANG, lang));
        }

        if let Some(score) = self.score {
            out.push(Predicate::gt(fields::SCORE, FilterValue::Float(score)));
        }

        if let Some(length) = self.length {
            out.push(Predicate::gt(fields::LENGTH, FilterValue::Int(length)));
        }

        out
    }
}

/// Canonical content type; unknown values pass through.
pub fn content_type_mapping(value: &str) -> String {
    match value {
        "news" => "news",
        "academic" | "arxiv" | "papers" | "journals" => "academic",
        "blog" | "blogs" => "blog",
        other => other,
    }
    .to_string()
}

/// Canonical site types; unknown values pass through as a single entry.
pub fn site_type_mapping(value: &str) -> Vec<String> {
    let mapped: &[&str] = match value {
        "blog" => &["blog", "individual / personal blog"],
        "periodic" => &["periodic newsletter digest"],
        "eng" => &["company engineering blog"],
        "news" => &["news / media publication"],
        other => return vec![other.to_string()],
    };
    mapped.iter().map(|s| (*s).to_string()).collect()
}

/// Look-back window in days for a `since:` value.
pub fn since_days(value: &str) -> Option<i64> {
    Some(match value {
        "yesterday" => 1,
        "last_3days" => 3,
        "last_week" => 7,
        "last_month" => 30,
        "last_3months" => 90,
        "last_year" => 365,
        _ => return None,
    })
}
