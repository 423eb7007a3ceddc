//! Request orchestration.
//!
//! [`SearchService`] wires the parser, resolver, dispatcher, normalizer and
//! enrichment together and owns the only shared state: the RSS response
//! cache and the enrichment worker pool. Provider failures never escape
//! [`SearchService::perform_search`]; they degrade to an empty response.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::config::SearchConfig;
use crate::export::{RssChannel, render_csv, render_opml, render_rss};
use crate::model::types::{SearchResponse, SearchResult};
use crate::search::SearchError;
use crate::search::embedder::{Embedder, VoyageEmbedder};
use crate::search::enrich::{CancelFlag, build_pool, enrich_feeds};
use crate::search::normalize::{dedupe_by_title, normalize_and_rank, sort_results_by_date};
use crate::search::query::{StructuredQuery, parse};
use crate::search::resolve::resolve_vector;
use crate::search::vector_index::{Namespaces, PineconeIndex, VectorIndex, dispatch};

/// Query used by the interactive page when none is given.
pub const DEFAULT_QUERY: &str = "ai, software development, startups, tech, data, computers \
                                 since:last_3days length:1000 type:blog score:0.6 lang:en";

/// Token that routes a query to the feed namespace.
pub const FEEDS_TOKEN: &str = "type:feeds";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchType {
    /// Individual posts.
    #[default]
    Pages,
    /// Whole sites (feeds).
    Sites,
}

impl SearchType {
    fn from_param(value: &str) -> Self {
        if value == "sites" {
            Self::Sites
        } else {
            Self::Pages
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pages => "pages",
            Self::Sites => "sites",
        }
    }
}

/// Request parameters as received from a query string or the CLI.
///
/// Empty values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub qry: String,
    pub search_type: SearchType,
    /// Content-type shorthand, appended as `type:<content>`.
    pub content: Option<String>,
    /// Recency shorthand, appended as `since:last_<time>`.
    pub time: Option<String>,
    /// `time` enables newest-first ordering for page searches.
    pub sort: Option<String>,
    pub include_posts: bool,
    pub dedupe: bool,
}

impl SearchParams {
    pub fn new(qry: impl Into<String>) -> Self {
        Self {
            qry: qry.into(),
            ..Self::default()
        }
    }

    /// Build from key/value pairs; the first value of a repeated key wins
    /// and unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        let mut seen: Vec<String> = Vec::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            let value = value.as_ref();
            if seen.iter().any(|k| k == key) {
                continue;
            }
            seen.push(key.to_string());
            let non_empty = || Some(value.to_string()).filter(|v| !v.is_empty());
            match key {
                "qry" => params.qry = value.to_string(),
                "type" => params.search_type = SearchType::from_param(value),
                "content" => params.content = non_empty(),
                "time" => params.time = non_empty(),
                "sort" => params.sort = non_empty(),
                "include_posts" => params.include_posts = value == "true",
                "dedupe" => params.dedupe = value == "true",
                _ => {}
            }
        }
        params
    }

    /// Parse a URL query string (`qry=rust+async&type=sites`).
    pub fn from_query_string(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let pairs = raw.split('&').filter(|p| !p.is_empty()).map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        });
        Self::from_pairs(pairs)
    }

    /// Canonical query string; also the RSS cache key.
    pub fn to_query_string(&self) -> String {
        let mut parts = vec![format!("qry={}", urlencoding::encode(&self.qry))];
        if self.search_type == SearchType::Sites {
            parts.push("type=sites".to_string());
        }
        for (key, value) in [
            ("content", &self.content),
            ("time", &self.time),
            ("sort", &self.sort),
        ] {
            if let Some(value) = value {
                parts.push(format!("{key}={}", urlencoding::encode(value)));
            }
        }
        if self.include_posts {
            parts.push("include_posts=true".to_string());
        }
        if self.dedupe {
            parts.push("dedupe=true".to_string());
        }
        parts.join("&")
    }

    /// The raw query with the shorthand parameters folded in as DSL tokens.
    pub fn compose_query(&self) -> String {
        let mut query = self.qry.clone();
        match self.search_type {
            SearchType::Sites => {
                query.push(' ');
                query.push_str(FEEDS_TOKEN);
            }
            SearchType::Pages => {
                if let Some(content) = &self.content {
                    query.push_str(&format!(" type:{content}"));
                }
                if let Some(time) = &self.time {
                    query.push_str(&format!(" since:last_{time}"));
                }
            }
        }
        query
    }

    /// Same parameters, with the query forced onto the feed namespace.
    pub fn for_feed_export(&self) -> Self {
        let mut params = self.clone();
        if !params.qry.contains(FEEDS_TOKEN) {
            params.qry.push(' ');
            params.qry.push_str(FEEDS_TOKEN);
        }
        params
    }

    fn sorts_by_time(&self) -> bool {
        self.sort.as_deref() == Some("time")
    }
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|c| c.into_owned())
        .unwrap_or(spaced)
}

/// Search front end over an embedding provider and a vector index.
pub struct SearchService {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    namespaces: Namespaces,
    cache: ResponseCache,
    pool: rayon::ThreadPool,
    max_results: usize,
    site_url: String,
}

impl SearchService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: &SearchConfig,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        Ok(Self {
            embedder,
            index,
            namespaces: Namespaces::from_config(config),
            cache: ResponseCache::new(),
            pool: build_pool(config.enrich_workers)?,
            max_results: config.max_results,
            site_url: config.site_url.clone(),
        })
    }

    /// Service backed by the Voyage and Pinecone HTTP clients.
    pub fn from_config(config: &SearchConfig) -> anyhow::Result<Self> {
        let embedder = Arc::new(VoyageEmbedder::from_config(config)?);
        let index = Arc::new(PineconeIndex::from_config(config)?);
        Ok(Self::new(embedder, index, config)?)
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Parse, resolve, dispatch and normalize one raw query.
    ///
    /// Errors from either provider are returned as-is; nothing is retried.
    fn run_query(
        &self,
        raw_query: &str,
    ) -> Result<(StructuredQuery, Vec<SearchResult>), SearchError> {
        let query = parse(raw_query);
        debug!(
            text = %query.text,
            filters = query.filters.len(),
            feeds = query.targets_feeds,
            "parsed query"
        );

        let vector = resolve_vector(
            &query,
            self.embedder.as_ref(),
            self.index.as_ref(),
            &self.namespaces,
        )?;
        let matches = dispatch(
            self.index.as_ref(),
            &self.namespaces,
            &query,
            vector.as_deref(),
            self.max_results,
        )?;
        let results = normalize_and_rank(&matches, &query);

        info!(
            embedder = self.embedder.id(),
            namespace = self.namespaces.for_query(&query),
            filters = query.filters.len(),
            results = results.len(),
            "search finished"
        );
        Ok((query, results))
    }

    /// Full search for one request. Never fails: provider errors are logged
    /// and produce an empty response with zero elapsed time.
    pub fn perform_search(&self, params: &SearchParams) -> SearchResponse {
        self.perform_search_with_cancel(params, &CancelFlag::new())
    }

    /// [`perform_search`](Self::perform_search) with a flag the caller can
    /// set to abandon outstanding enrichment work.
    pub fn perform_search_with_cancel(
        &self,
        params: &SearchParams,
        cancel: &CancelFlag,
    ) -> SearchResponse {
        let start = Instant::now();
        let raw_query = params.compose_query();

        let (query, mut results) = match self.run_query(&raw_query) {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %err, query = %raw_query, "search failed; returning no results");
                return SearchResponse::empty();
            }
        };

        if params.search_type == SearchType::Sites && params.include_posts && !results.is_empty()
        {
            enrich_feeds(
                &mut results,
                self.embedder.as_ref(),
                self.index.as_ref(),
                &self.namespaces,
                &self.pool,
                cancel,
            );
        }

        let wants_time_sort = params.sorts_by_time() || query.sorts_by_time();
        if params.search_type == SearchType::Pages && !query.targets_feeds && wants_time_sort {
            sort_results_by_date(&mut results);
        }

        if params.dedupe {
            results = dedupe_by_title(results);
        }

        SearchResponse::new(results, start.elapsed().as_secs_f64())
    }

    /// RSS document for `params`, served from the response cache while fresh.
    pub fn rss(&self, params: &SearchParams) -> Arc<str> {
        let key = params.to_query_string();
        self.cache.get_or_render(&key, || {
            let response = self.perform_search(params);
            let channel = RssChannel {
                query: params.qry.clone(),
                content: params.content.clone(),
                time: params.time.clone(),
                sites: params.search_type == SearchType::Sites,
                raw_query: key.clone(),
                site_url: self.site_url.clone(),
            };
            render_rss(&channel, &response.results, Utc::now())
        })
    }

    /// Feed results for `params`, always searched in the feed namespace.
    pub fn feed_results(&self, params: &SearchParams) -> (SearchParams, Vec<SearchResult>) {
        let params = params.for_feed_export();
        let results = self
            .perform_search(&params)
            .results
            .into_iter()
            .filter(|r| r.is_feed)
            .collect();
        (params, results)
    }

    pub fn export_opml(&self, params: &SearchParams) -> String {
        let (params, feeds) = self.feed_results(params);
        render_opml(&feeds, &params.qry, Utc::now())
    }

    pub fn export_csv(&self, params: &SearchParams) -> String {
        let (_, feeds) = self.feed_results(params);
        render_csv(&feeds)
    }
}
