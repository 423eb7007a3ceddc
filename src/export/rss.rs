//! RSS 2.0 channel built from content results.

use chrono::{DateTime, Utc};

use super::{SITE_NAME, display_title, rfc1123, xml_escape};
use crate::model::types::SearchResult;
use crate::search::normalize::parse_timestamp;

/// Maximum number of results considered for one channel.
pub const MAX_ITEMS: usize = 50;

/// Refresh hint in minutes; matches the response cache freshness window.
pub const TTL_MINUTES: u32 = 10;

/// Channel-level metadata for one syndicated search.
#[derive(Debug, Clone, Default)]
pub struct RssChannel {
    /// The user's query as typed.
    pub query: String,
    pub content: Option<String>,
    pub time: Option<String>,
    /// Whether the search was a site (feed) search.
    pub sites: bool,
    /// Raw request parameter string, used for the self link.
    pub raw_query: String,
    /// Public base URL of this service, without trailing slash.
    pub site_url: String,
}

impl RssChannel {
    pub fn title(&self) -> String {
        let mut title = format!("{SITE_NAME} Search: {}", self.query);
        if let Some(content) = self.content.as_deref().filter(|c| !c.is_empty()) {
            title.push_str(&format!(" ({content})"));
        }
        if let Some(time) = self.time.as_deref().filter(|t| !t.is_empty()) {
            title.push_str(&format!(" - {time}"));
        }
        title
    }

    pub fn description(&self) -> String {
        if self.sites {
            format!("RSS feeds matching: {}", self.query)
        } else {
            format!("Blog posts matching: {}", self.query)
        }
    }
}

/// Render an RSS 2.0 document.
///
/// Only the first [`MAX_ITEMS`] results are considered and feed-schema
/// results among them are skipped. Items without a usable date are stamped
/// with `now`.
pub fn render_rss(channel: &RssChannel, results: &[SearchResult], now: DateTime<Utc>) -> String {
    let build_date = rfc1123(&now);
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<rss version=\"2.0\" xmlns:atom=\"http://www.w3.org/2005/Atom\">\n<channel>\n");
    out.push_str(&format!("<title>{}</title>\n", xml_escape(&channel.title())));
    out.push_str(&format!(
        "<description>{}</description>\n",
        xml_escape(&channel.description())
    ));
    out.push_str(&format!(
        "<link>{}/?qry={}</link>\n",
        xml_escape(&channel.site_url),
        xml_escape(&urlencoding::encode(&channel.query))
    ));
    out.push_str(&format!(
        "<atom:link href=\"{}/rss?{}\" rel=\"self\" type=\"application/rss+xml\" />\n",
        xml_escape(&channel.site_url),
        xml_escape(&channel.raw_query)
    ));
    out.push_str(&format!("<lastBuildDate>{build_date}</lastBuildDate>\n"));
    out.push_str(&format!("<generator>{SITE_NAME}</generator>\n"));
    out.push_str(&format!("<ttl>{}</ttl>\n", TTL_MINUTES * 60));

    for result in results.iter().take(MAX_ITEMS).filter(|r| !r.is_feed) {
        push_item(&mut out, result, &build_date);
    }

    out.push_str("</channel>\n</rss>");
    out
}

fn push_item(out: &mut String, result: &SearchResult, build_date: &str) {
    let title = display_title(&result.title, &result.base_domain);
    let description = if result.subtitle.is_empty() {
        "No description available"
    } else {
        result.subtitle.as_str()
    };
    let pub_date = parse_timestamp(&result.date)
        .map(|dt| rfc1123(&dt))
        .unwrap_or_else(|| build_date.to_string());
    let link = xml_escape(&result.url);

    out.push_str("<item>\n");
    out.push_str(&format!("<title>{}</title>\n", xml_escape(&title)));
    out.push_str(&format!("<description>{}</description>\n", xml_escape(description)));
    out.push_str(&format!("<link>{link}</link>\n"));
    out.push_str(&format!("<guid isPermaLink=\"true\">{link}</guid>\n"));
    out.push_str(&format!("<pubDate>{pub_date}</pubDate>\n"));
    out.push_str(&format!("<source>{}</source>\n", xml_escape(&result.base_domain)));
    out.push_str("</item>\n");
}
