//! Search layer facade.
//!
//! - **[`query`]**: query DSL parsing into free text, predicates and modifiers.
//! - **[`embedder`]**: embedding provider trait and the Voyage HTTP client.
//! - **[`resolve`]**: choosing the query vector (text, filter-only, `like:`).
//! - **[`vector_index`]**: index provider trait, filter translation, Pinecone client, dispatch.
//! - **[`normalize`]**: match-to-result mapping, date canonicalization, secondary ordering.
//! - **[`enrich`]**: latest-post-per-feed enrichment on a bounded worker pool.
//! - **[`service`]**: request orchestration for search, RSS and exports.

pub mod embedder;
pub mod enrich;
pub mod normalize;
pub mod query;
pub mod resolve;
pub mod service;
pub mod vector_index;

use embedder::EmbedderError;
use vector_index::IndexError;

/// Failure of one search operation.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("index query failed: {0}")]
    Index(#[from] IndexError),

    /// Per-feed failure during enrichment; logged, never returned to callers.
    #[error("enrichment failed for {domain}: {source}")]
    Enrichment { domain: String, source: IndexError },
}
