//! Runtime configuration read from the environment.

use std::time::Duration;

pub const DEFAULT_VOYAGE_URL: &str = "https://api.voyageai.com/v1/embeddings";
pub const DEFAULT_VOYAGE_MODEL: &str = "voyage-3-large";
pub const DEFAULT_CONTENT_NAMESPACE: &str = "blaze-content-v3";
pub const DEFAULT_FEED_NAMESPACE: &str = "blaze-feeds-v2";
pub const DEFAULT_SITE_URL: &str = "http://localhost:8000";

/// Provider credentials, namespaces and tuning knobs for a search service.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub voyage_api_key: String,
    pub voyage_url: String,
    pub voyage_model: String,
    pub pinecone_api_key: String,
    /// Index host base URL, e.g. `https://my-index.svc.pinecone.io`.
    pub pinecone_host: String,
    pub content_namespace: String,
    pub feed_namespace: String,
    /// Per-call timeout for embedding and index requests.
    pub request_timeout: Duration,
    /// topK for the main similarity query.
    pub max_results: usize,
    /// Worker threads used for feed enrichment.
    pub enrich_workers: usize,
    /// Public base URL used for links in generated feeds.
    pub site_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            voyage_api_key: String::new(),
            voyage_url: DEFAULT_VOYAGE_URL.to_string(),
            voyage_model: DEFAULT_VOYAGE_MODEL.to_string(),
            pinecone_api_key: String::new(),
            pinecone_host: String::new(),
            content_namespace: DEFAULT_CONTENT_NAMESPACE.to_string(),
            feed_namespace: DEFAULT_FEED_NAMESPACE.to_string(),
            request_timeout: Duration::from_secs(30),
            max_results: 50,
            enrich_workers: 4,
            site_url: DEFAULT_SITE_URL.to_string(),
        }
    }
}

impl SearchConfig {
    /// Load from environment, keeping defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(val) = dotenvy::var("VOYAGE_API_KEY") {
            cfg.voyage_api_key = val;
        }
        if let Ok(val) = dotenvy::var("VOYAGE_API_URL") {
            cfg.voyage_url = val;
        }
        if let Ok(val) = dotenvy::var("VOYAGE_MODEL") {
            cfg.voyage_model = val;
        }
        if let Ok(val) = dotenvy::var("PINECONE_API_KEY") {
            cfg.pinecone_api_key = val;
        }
        if let Ok(val) = dotenvy::var("PINECONE_HOST") {
            cfg.pinecone_host = val.trim_end_matches('/').to_string();
        }
        if let Ok(val) = dotenvy::var("BLOGSEARCH_CONTENT_NAMESPACE") {
            cfg.content_namespace = val;
        }
        if let Ok(val) = dotenvy::var("BLOGSEARCH_FEED_NAMESPACE") {
            cfg.feed_namespace = val;
        }

        if let Ok(val) = dotenvy::var("BLOGSEARCH_TIMEOUT_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            cfg.request_timeout = Duration::from_millis(ms);
        }

        if let Ok(val) = dotenvy::var("BLOGSEARCH_MAX_RESULTS")
            && let Ok(n) = val.parse::<usize>()
            && n > 0
        {
            cfg.max_results = n;
        }

        if let Ok(val) = dotenvy::var("BLOGSEARCH_ENRICH_WORKERS")
            && let Ok(n) = val.parse::<usize>()
            && n > 0
        {
            cfg.enrich_workers = n;
        }

        if let Ok(val) = dotenvy::var("BLOGSEARCH_SITE_URL") {
            cfg.site_url = val.trim_end_matches('/').to_string();
        }

        cfg
    }
}
