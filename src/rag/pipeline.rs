//! Retrieval pipeline orchestration
//!
//! Coordinates the full ingest flow (extract → hash → dedup → chunk →
//! embed → upsert) and query-time retrieval (search → threshold filter →
//! token-bounded assembly). A document is visible to search only when every
//! one of its chunks is stored: a failure partway through storage triggers
//! a best-effort rollback of the partial document before the error
//! surfaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::errors::{BotError, Result};
use crate::rag::chunker::Chunker;
use crate::rag::context::{ContextBuilder, RetrievedContext};
use crate::rag::embedding::Embedder;
use crate::rag::hash::content_hash;
use crate::rag::loader;
use crate::rag::store::{StoreInfo, VectorStore};

/// Retrieval tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagOptions {
    pub similarity_threshold: f32,
    pub search_limit: u64,
    pub max_context_tokens: usize,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            search_limit: 10,
            max_context_tokens: 3000,
        }
    }
}

/// Outcome of an ingestion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// Document was chunked, embedded, and fully stored
    Stored,
    /// Identical content already in the store; nothing was written
    Duplicate,
}

/// Report returned to the uploading caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub status: IngestStatus,
    pub content_hash: String,
    pub chunk_count: usize,
    pub filename: String,
}

/// Per-document metadata persisted alongside every chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub content_hash: String,
    pub filename: String,
    pub byte_size: u64,
    pub mime_type: String,
    pub ingested_at: DateTime<Utc>,
}

/// End-to-end RAG pipeline
pub struct RagPipeline {
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    context_builder: ContextBuilder,
    options: RagOptions,
}

impl RagPipeline {
    pub fn new(
        store: VectorStore,
        embedder: Arc<dyn Embedder>,
        chunker: Chunker,
        options: RagOptions,
    ) -> Self {
        let context_builder = ContextBuilder::new(options.max_context_tokens);
        Self {
            store,
            embedder,
            chunker,
            context_builder,
            options,
        }
    }

    pub fn options(&self) -> &RagOptions {
        &self.options
    }

    /// Ingest one document file.
    ///
    /// Identical content (by hash of the extracted text) short-circuits to
    /// a `Duplicate` report carrying the already-stored chunk count. Any
    /// stage failure aborts the whole document; if chunks were partially
    /// written, they are rolled back before the error is returned so the
    /// store never exposes a half-ingested document.
    pub async fn add_document(&self, path: &Path) -> Result<IngestReport> {
        let document = loader::load_document(path)?;
        if document.text.trim().is_empty() {
            return Err(BotError::Extraction(
                "document contains no extractable text".to_string(),
            ));
        }

        let hash = content_hash(&document.text);
        tracing::info!(filename = %document.filename, content_hash = %hash, "ingesting document");

        if self.store.contains_document(&hash).await? {
            let existing = self.store.chunk_count(&hash).await? as usize;
            tracing::info!(content_hash = %hash, chunk_count = existing, "duplicate content, skipping");
            return Ok(IngestReport {
                status: IngestStatus::Duplicate,
                content_hash: hash,
                chunk_count: existing,
                filename: document.filename,
            });
        }

        let chunks = self.chunker.chunk(&document.text);
        let metadata = DocumentMetadata {
            content_hash: hash.clone(),
            filename: document.filename.clone(),
            byte_size: document.byte_size,
            mime_type: document.mime_type.to_string(),
            ingested_at: Utc::now(),
        };

        match self
            .store
            .store_chunks(&chunks, &metadata, self.embedder.as_ref())
            .await
        {
            Ok(stored) => {
                tracing::info!(content_hash = %hash, chunk_count = stored, "document stored");
                Ok(IngestReport {
                    status: IngestStatus::Stored,
                    content_hash: hash,
                    chunk_count: stored,
                    filename: document.filename,
                })
            }
            Err(e) => {
                // Roll back whatever made it in so the document is either
                // fully stored or absent.
                if let Err(cleanup) = self.store.delete_document(&hash).await {
                    tracing::warn!(content_hash = %hash, error = %cleanup, "rollback of partial document failed");
                }
                Err(e)
            }
        }
    }

    /// Retrieve a token-bounded context for a query.
    ///
    /// A blank query, or one where nothing clears the similarity
    /// threshold, returns an empty context: callers answer without
    /// augmentation. Store and embedding failures propagate typed.
    pub async fn retrieve_context(
        &self,
        query: &str,
        max_tokens: Option<usize>,
    ) -> Result<RetrievedContext> {
        if query.trim().is_empty() {
            return Ok(RetrievedContext::default());
        }

        let results = self
            .store
            .search(
                query,
                self.embedder.as_ref(),
                self.options.search_limit,
                self.options.similarity_threshold,
            )
            .await?;

        let budget = max_tokens.unwrap_or(self.options.max_context_tokens);
        let context = self.context_builder.assemble_within(&results, budget);
        tracing::debug!(
            results = results.len(),
            included = context.chunk_count,
            tokens = context.estimated_tokens,
            "assembled retrieval context"
        );
        Ok(context)
    }

    /// Remove every chunk of one document. Idempotent for absent hashes.
    pub async fn delete_document(&self, content_hash: &str) -> Result<()> {
        self.store.delete_document(content_hash).await
    }

    /// Store diagnostics for the info command.
    pub async fn info(&self) -> Result<StoreInfo> {
        self.store.info().await
    }
}
