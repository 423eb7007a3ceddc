//! Latest-post-per-feed enrichment.
//!
//! For the first [`ENRICH_CAP`] feed results, the content namespace is queried
//! for that site's posts and the newest one is attached as
//! [`LatestPost`]. Per-feed lookups run on a bounded rayon pool; results are
//! reassembled by feed index so output order never depends on completion order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::model::types::{LatestPost, Match, SearchResult, keys};
use crate::search::SearchError;
use crate::search::embedder::{EmbedPurpose, Embedder};
use crate::search::normalize::canonical_date;
use crate::search::query::{Predicate, fields};
use crate::search::resolve::FILTER_ONLY_TEXT;
use crate::search::vector_index::{Namespaces, VectorIndex};

/// Maximum number of feed results enriched per request.
pub const ENRICH_CAP: usize = 20;

/// Posts considered per feed when picking the newest.
pub const POSTS_PER_FEED: usize = 50;

/// Shared flag for abandoning outstanding per-feed lookups.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Build the worker pool enrichment runs on.
pub fn build_pool(workers: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("enrich-{i}"))
        .build()
}

/// Attach the latest post to each of the first [`ENRICH_CAP`] feed results.
///
/// Never fails: a failed shared embedding skips enrichment entirely, and a
/// failed lookup for one feed leaves only that feed unenriched.
pub fn enrich_feeds(
    results: &mut [SearchResult],
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    namespaces: &Namespaces,
    pool: &rayon::ThreadPool,
    cancel: &CancelFlag,
) {
    let targets: Vec<(usize, String)> = results
        .iter()
        .take(ENRICH_CAP)
        .enumerate()
        .filter(|(_, r)| r.is_feed && !r.original_domain.is_empty())
        .map(|(i, r)| (i, r.original_domain.clone()))
        .collect();
    if targets.is_empty() {
        return;
    }

    let shared = match embedder.embed(FILTER_ONLY_TEXT, EmbedPurpose::Query) {
        Ok(v) => v,
        Err(err) => {
            warn!(error = %err, "enrichment embedding failed; leaving feeds unenriched");
            return;
        }
    };

    let found: Vec<(usize, Option<LatestPost>)> = pool.install(|| {
        targets
            .par_iter()
            .map(|(i, domain)| {
                if cancel.is_cancelled() {
                    return (*i, None);
                }
                match latest_post_for(domain, &shared, index, namespaces) {
                    Ok(post) => (*i, post),
                    Err(err) => {
                        warn!(error = %err, "feed enrichment failed");
                        (*i, None)
                    }
                }
            })
            .collect()
    });

    let mut enriched = 0usize;
    for (i, post) in found {
        if let Some(post) = post {
            results[i].latest_post = Some(post);
            enriched += 1;
        }
    }
    debug!(requested = targets.len(), enriched, "feed enrichment finished");
}

fn latest_post_for(
    domain: &str,
    vector: &[f32],
    index: &dyn VectorIndex,
    namespaces: &Namespaces,
) -> Result<Option<LatestPost>, SearchError> {
    let filter = [Predicate::eq(fields::CONTENT_SITE, domain)];
    let matches = index
        .query(&namespaces.content, vector, &filter, POSTS_PER_FEED)
        .map_err(|source| SearchError::Enrichment {
            domain: domain.to_string(),
            source,
        })?;
    Ok(latest_post_from_matches(&matches))
}

/// Newest match by publish date; the first of equal dates wins and undated
/// matches only win when nothing is dated.
pub fn latest_post_from_matches(matches: &[Match]) -> Option<LatestPost> {
    let mut newest = matches.first()?;
    let mut newest_date = newest.metadata.date(keys::PUBLISHED);
    for m in &matches[1..] {
        let date = m.metadata.date(keys::PUBLISHED);
        if date > newest_date {
            newest = m;
            newest_date = date;
        }
    }

    let meta = &newest.metadata;
    Some(LatestPost {
        title: meta.string_or_empty(keys::TITLE).to_string(),
        url: newest.id.clone(),
        date: canonical_date(meta.string_or_empty(keys::PUBLISHED)),
        snippet: meta.string_or_empty(keys::SUBTITLE).to_string(),
    })
}
