//! Document exports built from normalized search results.
//!
//! ```text
//! export/
//! ├── mod.rs    # shared escaping and date helpers (this file)
//! ├── opml.rs   # OPML outline of feed results
//! ├── csv.rs    # spreadsheet export of feed results
//! └── rss.rs    # RSS 2.0 channel of content results
//! ```

pub mod csv;
pub mod opml;
pub mod rss;

use chrono::{DateTime, TimeZone, Utc};

pub use csv::{CSV_HEADER, render_csv};
pub use opml::render_opml;
pub use rss::{RssChannel, render_rss};

/// Product name shown in generated document titles.
pub const SITE_NAME: &str = "BlogNerd";

/// Escape text for XML element content and attribute values.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// RFC 1123 date as used by RSS and OPML, always in GMT.
pub fn rfc1123<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    dt.with_timezone(&Utc)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Title to show for a result, falling back to its bare domain.
pub(crate) fn display_title(title: &str, base_domain: &str) -> String {
    if title.is_empty() {
        base_domain.to_string()
    } else {
        title.to_string()
    }
}
