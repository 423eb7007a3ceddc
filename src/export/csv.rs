//! CSV export of feed results.

use super::display_title;
use crate::model::types::SearchResult;

pub const CSV_HEADER: [&str; 4] = ["Title", "Description", "Website URL", "RSS Feed URL"];

/// Render feed results as CSV with a fixed header row.
///
/// Non-feed results are skipped. Lines end with `\n`.
pub fn render_csv(results: &[SearchResult]) -> String {
    let mut out = String::new();
    push_record(&mut out, &CSV_HEADER);
    for feed in results.iter().filter(|r| r.is_feed) {
        let title = display_title(&feed.title, &feed.base_domain);
        push_record(
            &mut out,
            &[
                title.as_str(),
                feed.subtitle.as_str(),
                feed.url.as_str(),
                feed.rss_url.as_str(),
            ],
        );
    }
    out
}

fn push_record(out: &mut String, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&quote_field(field));
    }
    out.push('\n');
}

/// Quote a field when it contains a delimiter, quote or line break, or
/// starts with whitespace.
fn quote_field(field: &str) -> String {
    if field.is_empty() {
        return String::new();
    }
    let needs_quotes = field.contains([',', '"', '\n', '\r']) || field.starts_with([' ', '\t']);
    if needs_quotes {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
