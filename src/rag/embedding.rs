//! Embedding API client
//!
//! Thin reqwest client for an OpenAI-compatible `/embeddings` endpoint.
//! The [`Embedder`] trait is the injection seam: the store and pipeline
//! never talk to the network directly, so tests swap in a deterministic
//! embedder.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{ApiErrorKind, BotError, Result};

/// Vector width of text-embedding-3-small, the default model.
pub const EMBEDDING_DIM: u64 = 1536;

/// Anything that can turn text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// HTTP client for the embedding API
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRecord>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRecord {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    /// Create an embedding client with a per-call timeout.
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| BotError::Embedding {
                kind: transport_error_kind(&e),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Embedding {
                kind: status_error_kind(status),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| BotError::Embedding {
            kind: ApiErrorKind::Other,
            message: format!("unparseable response: {}", e),
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|r| r.embedding)
            .ok_or_else(|| BotError::Embedding {
                kind: ApiErrorKind::Other,
                message: "response contained no embedding".to_string(),
            })
    }
}

/// Map an HTTP status to the retryable/fatal taxonomy.
pub(crate) fn status_error_kind(status: StatusCode) -> ApiErrorKind {
    match status.as_u16() {
        429 => ApiErrorKind::RateLimited,
        401 | 403 => ApiErrorKind::Auth,
        s if s >= 500 => ApiErrorKind::Server,
        _ => ApiErrorKind::Other,
    }
}

pub(crate) fn transport_error_kind(error: &reqwest::Error) -> ApiErrorKind {
    if error.is_timeout() {
        ApiErrorKind::Timeout
    } else {
        ApiErrorKind::Other
    }
}
