//! OPML export of feed results.

use chrono::{DateTime, Utc};

use super::{SITE_NAME, display_title, rfc1123, xml_escape};
use crate::model::types::SearchResult;

/// Render an OPML document with one `rss` outline per feed result.
///
/// Non-feed results are skipped.
pub fn render_opml(results: &[SearchResult], query: &str, created: DateTime<Utc>) -> String {
    let stamp = rfc1123(&created);
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<opml version=\"1.0\">\n<head>\n");
    out.push_str(&format!("<title>{SITE_NAME} Feed Export</title>\n"));
    out.push_str(&format!("<dateCreated>{stamp}</dateCreated>\n"));
    out.push_str(&format!("<dateModified>{stamp}</dateModified>\n"));
    out.push_str("<docs>http://www.opml.org/spec2</docs>\n</head>\n<body>\n");
    out.push_str(&format!(
        "<outline text=\"{SITE_NAME} Search Results: {}\" title=\"{SITE_NAME} Search Results\">\n",
        xml_escape(query)
    ));

    for feed in results.iter().filter(|r| r.is_feed) {
        let title = xml_escape(&display_title(&feed.title, &feed.base_domain));
        out.push_str(&format!(
            "<outline type=\"rss\" text=\"{title}\" title=\"{title}\" xmlUrl=\"{}\" htmlUrl=\"{}\"",
            xml_escape(&feed.rss_url),
            xml_escape(&feed.url)
        ));
        if !feed.subtitle.is_empty() {
            out.push_str(&format!(" description=\"{}\"", xml_escape(&feed.subtitle)));
        }
        out.push_str("/>\n");
    }

    out.push_str("</outline>\n</body>\n</opml>");
    out
}
