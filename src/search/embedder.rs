//! Embedding provider abstraction.
//!
//! [`Embedder`] maps text to a fixed-length vector. Search code only talks to
//! the trait so tests can swap in deterministic fakes; production uses
//! [`VoyageEmbedder`], a blocking HTTP client for a Voyage-compatible
//! `/v1/embeddings` endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SearchConfig;

/// Whether the text is a search query or a stored document.
///
/// Asymmetric embedding models encode the two differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedPurpose {
    Query,
    Document,
}

/// Error type for embedder operations.
#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    #[error("input text is empty")]
    EmptyInput,

    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedding API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("no embedding returned")]
    MissingEmbedding,

    #[error("expected {expected} embeddings, got {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("invalid index {0} in embedding response")]
    InvalidIndex(usize),

    #[error("embedder unavailable: {0}")]
    Unavailable(String),
}

/// Result type for embedder operations.
pub type EmbedderResult<T> = Result<T, EmbedderError>;

/// Trait for text embedding providers.
///
/// Implementations must be `Send + Sync`; the enrichment pool calls them
/// from worker threads.
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// - [`EmbedderError::EmptyInput`] if `text` is empty.
    /// - Transport or provider errors otherwise. Callers do not retry.
    fn embed(&self, text: &str, purpose: EmbedPurpose) -> EmbedderResult<Vec<f32>>;

    /// Embed several texts; output order matches input order.
    ///
    /// The default implementation calls [`embed()`](Self::embed) per text.
    fn embed_batch(&self, texts: &[&str], purpose: EmbedPurpose) -> EmbedderResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(EmbedderError::EmptyInput);
        }
        texts.iter().map(|t| self.embed(t, purpose)).collect()
    }

    /// Identifier for logs (model name).
    fn id(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [&'a str],
    model: &'a str,
    input_type: EmbedPurpose,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Blocking HTTP client for a Voyage-compatible embeddings API.
pub struct VoyageEmbedder {
    client: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl VoyageEmbedder {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> EmbedderResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("blogsearch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &SearchConfig) -> EmbedderResult<Self> {
        Self::new(
            config.voyage_api_key.clone(),
            config.voyage_url.clone(),
            config.voyage_model.clone(),
            config.request_timeout,
        )
    }

    fn request(&self, texts: &[&str], purpose: EmbedPurpose) -> EmbedderResult<EmbeddingResponse> {
        let body = EmbeddingRequest {
            input: texts,
            model: &self.model,
            input_type: purpose,
        };
        debug!(model = %self.model, count = texts.len(), ?purpose, "embedding request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EmbedderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<EmbeddingResponse>()?)
    }
}

impl Embedder for VoyageEmbedder {
    fn embed(&self, text: &str, purpose: EmbedPurpose) -> EmbedderResult<Vec<f32>> {
        if text.is_empty() {
            return Err(EmbedderError::EmptyInput);
        }
        let response = self.request(&[text], purpose)?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(EmbedderError::MissingEmbedding)
    }

    fn embed_batch(&self, texts: &[&str], purpose: EmbedPurpose) -> EmbedderResult<Vec<Vec<f32>>> {
        if texts.is_empty() || texts.iter().any(|t| t.is_empty()) {
            return Err(EmbedderError::EmptyInput);
        }
        let response = self.request(texts, purpose)?;
        reorder_by_index(response.data, texts.len())
    }

    fn id(&self) -> &str {
        &self.model
    }
}

/// Place each returned embedding at its declared input index.
fn reorder_by_index(data: Vec<EmbeddingData>, expected: usize) -> EmbedderResult<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(EmbedderError::CountMismatch {
            expected,
            got: data.len(),
        });
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        let slot = slots
            .get_mut(item.index)
            .ok_or(EmbedderError::InvalidIndex(item.index))?;
        *slot = Some(item.embedding);
    }
    // Duplicate indices leave a hole, which is as bad as a short response.
    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or(EmbedderError::MissingEmbedding)
}
