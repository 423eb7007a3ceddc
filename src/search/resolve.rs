//! Choosing the vector a search runs with.

use tracing::debug;

use crate::search::SearchError;
use crate::search::embedder::{EmbedPurpose, Embedder};
use crate::search::query::{LikeReference, Predicate, StructuredQuery, fields};
use crate::search::vector_index::{Namespaces, VectorIndex};

/// Text embedded to look up a site's own feed entry for `like:`.
pub const SIMILAR_SITE_QUERY: &str = "blog content";

/// Stand-in text for filter-only queries.
pub const FILTER_ONLY_TEXT: &str = "content";

/// Resolve the query vector, in priority order:
///
/// 1. `like:` reference: a URL on a content search reuses that item's stored
///    vector; anything else is treated as a domain (see [`similar_site_vector`]).
/// 2. Free text: embedded as a query.
/// 3. Filters only: [`FILTER_ONLY_TEXT`] is embedded so ranking still works.
/// 4. Nothing at all: `None`.
pub fn resolve_vector(
    query: &StructuredQuery,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    namespaces: &Namespaces,
) -> Result<Option<Vec<f32>>, SearchError> {
    if let Some(reference) = &query.like_reference {
        let vector = match reference {
            LikeReference::Url(url) if !query.targets_feeds => {
                debug!(url = %url, "reusing stored vector for like: url");
                index.fetch_vector(url, &namespaces.content)?
            }
            other => similar_site_vector(other.as_str(), embedder, index, namespaces)?,
        };
        return Ok(Some(vector));
    }

    if query.has_free_text() {
        return Ok(Some(embedder.embed(&query.text, EmbedPurpose::Query)?));
    }

    if !query.filters.is_empty() {
        return Ok(Some(embedder.embed(FILTER_ONLY_TEXT, EmbedPurpose::Query)?));
    }

    Ok(None)
}

/// Stored vector of the feed entry for `domain`, or an embedding of the
/// domain text when the feed namespace has no such entry.
pub fn similar_site_vector(
    domain: &str,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    namespaces: &Namespaces,
) -> Result<Vec<f32>, SearchError> {
    let lookup = embedder.embed(SIMILAR_SITE_QUERY, EmbedPurpose::Query)?;
    let filter = [Predicate::eq(fields::FEED_SITE, domain)];
    let hits = index.query(&namespaces.feeds, &lookup, &filter, 1)?;

    match hits.first() {
        Some(hit) => {
            debug!(domain, id = %hit.id, "like: domain matched a feed entry");
            Ok(index.fetch_vector(&hit.id, &namespaces.feeds)?)
        }
        None => {
            debug!(domain, "like: domain has no feed entry; embedding domain text");
            Ok(embedder.embed(domain, EmbedPurpose::Query)?)
        }
    }
}
