//! Vector index provider abstraction and the index dispatcher.
//!
//! [`VectorIndex`] is the seam over the similarity-search backend.
//! [`PineconeIndex`] speaks the Pinecone data-plane HTTP API; tests use
//! in-memory fakes. [`dispatch`] picks the namespace for a structured query
//! and guards against empty vectors.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::SearchConfig;
use crate::model::types::Match;
use crate::search::query::{Predicate, StructuredQuery};

/// Error type for index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("index API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("vector not found: {0}")]
    VectorNotFound(String),

    #[error("malformed index response: {0}")]
    Decode(String),
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Similarity-search backend.
pub trait VectorIndex: Send + Sync {
    /// Top `top_k` matches for `vector` in `namespace`, best first.
    ///
    /// All predicates must hold (implicit AND).
    fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        filters: &[Predicate],
        top_k: usize,
    ) -> IndexResult<Vec<Match>>;

    /// Stored vector for `id` in `namespace`.
    fn fetch_vector(&self, id: &str, namespace: &str) -> IndexResult<Vec<f32>>;
}

/// The two namespaces a search can target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    pub content: String,
    pub feeds: String,
}

impl Namespaces {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            content: config.content_namespace.clone(),
            feeds: config.feed_namespace.clone(),
        }
    }

    /// Routing decision for one request.
    pub fn for_query(&self, query: &StructuredQuery) -> &str {
        if query.targets_feeds {
            &self.feeds
        } else {
            &self.content
        }
    }
}

/// Translate predicates into the provider's filter document.
///
/// Each predicate becomes `{field: {"$op": value}}` in one flat object.
/// Returns `None` when there is nothing to filter on.
pub fn filter_json(filters: &[Predicate]) -> Option<Value> {
    if filters.is_empty() {
        return None;
    }
    let mut clauses = Map::new();
    for p in filters {
        let mut clause = Map::new();
        clause.insert(p.op.tag().to_string(), json!(p.value));
        clauses.insert(p.field.to_string(), Value::Object(clause));
    }
    Some(Value::Object(clauses))
}

/// Run the main similarity query for `query`.
///
/// Short-circuits to an empty list without touching the provider when
/// `vector` is absent or empty.
pub fn dispatch(
    index: &dyn VectorIndex,
    namespaces: &Namespaces,
    query: &StructuredQuery,
    vector: Option<&[f32]>,
    top_k: usize,
) -> IndexResult<Vec<Match>> {
    let Some(vector) = vector.filter(|v| !v.is_empty()) else {
        debug!("no query vector; skipping index call");
        return Ok(Vec::new());
    };
    let namespace = namespaces.for_query(query);
    debug!(namespace, filters = query.filters.len(), top_k, "dispatching similarity query");
    index.query(namespace, vector, &query.filters, top_k)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    namespace: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, FetchedVector>,
}

#[derive(Debug, Deserialize)]
struct FetchedVector {
    #[serde(default)]
    values: Vec<f32>,
}

/// Blocking HTTP client for a Pinecone index host.
pub struct PineconeIndex {
    client: reqwest::blocking::Client,
    api_key: String,
    host: String,
}

impl PineconeIndex {
    pub fn new(
        api_key: impl Into<String>,
        host: impl Into<String>,
        timeout: Duration,
    ) -> IndexResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("blogsearch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let host: String = host.into();
        Ok(Self {
            client,
            api_key: api_key.into(),
            host: host.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SearchConfig) -> IndexResult<Self> {
        Self::new(
            config.pinecone_api_key.clone(),
            config.pinecone_host.clone(),
            config.request_timeout,
        )
    }

    fn check(response: reqwest::blocking::Response) -> IndexResult<reqwest::blocking::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(IndexError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

impl VectorIndex for PineconeIndex {
    fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        filters: &[Predicate],
        top_k: usize,
    ) -> IndexResult<Vec<Match>> {
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace,
            filter: filter_json(filters),
        };
        let response = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()?;
        let parsed: QueryResponse = Self::check(response)?
            .json()
            .map_err(|e| IndexError::Decode(e.to_string()))?;
        Ok(parsed.matches)
    }

    fn fetch_vector(&self, id: &str, namespace: &str) -> IndexResult<Vec<f32>> {
        let url = fetch_url(&self.host, id, namespace);
        let response = self.client.get(url).header("Api-Key", &self.api_key).send()?;
        let parsed: FetchResponse = Self::check(response)?
            .json()
            .map_err(|e| IndexError::Decode(e.to_string()))?;
        parsed
            .vectors
            .get(id)
            .map(|v| v.values.clone())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| IndexError::VectorNotFound(id.to_string()))
    }
}

fn fetch_url(host: &str, id: &str, namespace: &str) -> String {
    format!(
        "{host}/vectors/fetch?ids={}&namespace={}",
        urlencoding::encode(id),
        urlencoding::encode(namespace)
    )
}
