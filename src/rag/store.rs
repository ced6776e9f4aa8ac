//! Vector store adapter over a qdrant collection
//!
//! Owns the collection schema and the payload layout. Every chunk is one
//! point keyed deterministically by `content_hash:chunk_index`, so a
//! re-ingest after a partial failure overwrites instead of duplicating.
//! Similarity filtering happens server-side via `score_threshold`, which
//! means a search can return fewer than `limit` results but never one below
//! the threshold.

use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        condition::ConditionOneOf, points_selector::PointsSelectorOneOf,
        r#match::MatchValue, vectors_config::Config, with_payload_selector::SelectorOptions,
        Condition, CountPoints, CreateCollection, Distance, FieldCondition, Filter, Match,
        PointStruct, PointsSelector, ScrollPoints, SearchPoints, Value as QdrantValue,
        VectorParams, VectorsConfig, WithPayloadSelector,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::errors::{BotError, Result};
use crate::rag::embedding::{Embedder, EMBEDDING_DIM};
use crate::rag::pipeline::DocumentMetadata;

/// Page size when scrolling payloads for diagnostics
const SCROLL_PAGE: u32 = 256;
/// Upper bound on points scanned by [`VectorStore::info`]
const SCROLL_SCAN_CAP: usize = 10_000;

/// One similarity-search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f32,
    /// Original filename of the owning document
    pub source: String,
    pub content_hash: String,
    pub chunk_index: usize,
}

/// Collection diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreInfo {
    pub collection: String,
    pub chunk_count: u64,
    pub document_count: u64,
}

/// Adapter over one qdrant collection
pub struct VectorStore {
    client: QdrantClient,
    collection: String,
}

impl VectorStore {
    /// Connect to qdrant and create the collection if it does not exist
    /// (cosine distance, [`EMBEDDING_DIM`]-wide vectors).
    pub async fn connect(url: &str, collection: &str) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| BotError::Store(format!("failed to create qdrant client: {}", e)))?;

        let store = Self {
            client,
            collection: collection.to_string(),
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| BotError::Store(format!("failed to list collections: {}", e)))?;
        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            self.client
                .create_collection(&CreateCollection {
                    collection_name: self.collection.clone(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(Config::Params(VectorParams {
                            size: EMBEDDING_DIM,
                            distance: Distance::Cosine.into(),
                            ..Default::default()
                        })),
                    }),
                    ..Default::default()
                })
                .await
                .map_err(|e| {
                    BotError::Store(format!(
                        "failed to create collection {}: {}",
                        self.collection, e
                    ))
                })?;
        }
        Ok(())
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed and upsert every chunk of one document. Each chunk upsert is
    /// an independent call: a mid-batch failure leaves earlier chunks
    /// stored and later ones absent, which the pipeline rolls back.
    pub async fn store_chunks(
        &self,
        chunks: &[String],
        metadata: &DocumentMetadata,
        embedder: &dyn Embedder,
    ) -> Result<usize> {
        for (index, chunk) in chunks.iter().enumerate() {
            let vector = embedder.embed(chunk).await?;
            let point = PointStruct::new(
                chunk_point_id(&metadata.content_hash, index),
                vector,
                chunk_payload(chunk, metadata, index, chunks.len()),
            );
            self.client
                .upsert_points_blocking(&self.collection, None, vec![point], None)
                .await
                .map_err(|e| {
                    BotError::Store(format!("failed to upsert chunk {}: {}", index, e))
                })?;
            tracing::debug!(
                chunk_index = index,
                content_hash = %metadata.content_hash,
                "stored chunk"
            );
        }
        Ok(chunks.len())
    }

    /// Embed the query and run a nearest-neighbor search, ordered by
    /// descending similarity. The threshold is applied by the store, so no
    /// below-threshold result can appear even when fewer than `limit`
    /// points match.
    pub async fn search(
        &self,
        query: &str,
        embedder: &dyn Embedder,
        limit: u64,
        threshold: f32,
    ) -> Result<Vec<ScoredChunk>> {
        let query_vector = embedder.embed(query).await?;

        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: query_vector,
                limit,
                score_threshold: Some(threshold),
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| BotError::Store(format!("search failed: {}", e)))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| scored_chunk_from_payload(point.score, point.payload))
            .collect())
    }

    /// Whether any chunk of the given document is stored.
    pub async fn contains_document(&self, content_hash: &str) -> Result<bool> {
        Ok(self.chunk_count(content_hash).await? > 0)
    }

    /// Number of stored chunks belonging to one document.
    pub async fn chunk_count(&self, content_hash: &str) -> Result<u64> {
        let response = self
            .client
            .count(&CountPoints {
                collection_name: self.collection.clone(),
                filter: Some(hash_filter(content_hash)),
                exact: Some(true),
                ..Default::default()
            })
            .await
            .map_err(|e| BotError::Store(format!("count failed: {}", e)))?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    /// Delete every chunk of one document. Idempotent: deleting an absent
    /// document succeeds without effect. Blocks until applied so a
    /// follow-up dedup check cannot see half-deleted state.
    pub async fn delete_document(&self, content_hash: &str) -> Result<()> {
        self.client
            .delete_points_blocking(
                &self.collection,
                None,
                &PointsSelector {
                    points_selector_one_of: Some(PointsSelectorOneOf::Filter(hash_filter(
                        content_hash,
                    ))),
                },
                None,
            )
            .await
            .map_err(|e| BotError::Store(format!("delete failed: {}", e)))?;
        Ok(())
    }

    /// Collection diagnostics: total chunk count plus distinct document
    /// count (bounded payload scroll).
    pub async fn info(&self) -> Result<StoreInfo> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| BotError::Store(format!("collection info failed: {}", e)))?;
        let chunk_count = info.result.and_then(|r| r.points_count).unwrap_or(0);

        let mut hashes: HashSet<String> = HashSet::new();
        let mut offset = None;
        let mut scanned = 0usize;
        loop {
            let page = self
                .client
                .scroll(&ScrollPoints {
                    collection_name: self.collection.clone(),
                    offset: offset.clone(),
                    limit: Some(SCROLL_PAGE),
                    with_payload: Some(WithPayloadSelector {
                        selector_options: Some(SelectorOptions::Enable(true)),
                    }),
                    ..Default::default()
                })
                .await
                .map_err(|e| BotError::Store(format!("scroll failed: {}", e)))?;

            scanned += page.result.len();
            for point in &page.result {
                if let Some(hash) = point
                    .payload
                    .get("content_hash")
                    .and_then(payload_value_to_string)
                {
                    hashes.insert(hash);
                }
            }

            offset = page.next_page_offset;
            if offset.is_none() || scanned >= SCROLL_SCAN_CAP {
                break;
            }
        }

        Ok(StoreInfo {
            collection: self.collection.clone(),
            chunk_count,
            document_count: hashes.len() as u64,
        })
    }
}

/// Deterministic point id for one chunk: UUIDv5 of `content_hash:index`.
pub(crate) fn chunk_point_id(content_hash: &str, index: usize) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{}:{}", content_hash, index).as_bytes(),
    )
    .to_string()
}

fn chunk_payload(
    text: &str,
    metadata: &DocumentMetadata,
    index: usize,
    total: usize,
) -> HashMap<String, QdrantValue> {
    let mut payload = HashMap::new();
    payload.insert("text".to_string(), QdrantValue::from(text.to_string()));
    payload.insert(
        "content_hash".to_string(),
        QdrantValue::from(metadata.content_hash.clone()),
    );
    payload.insert("chunk_index".to_string(), QdrantValue::from(index as i64));
    payload.insert("total_chunks".to_string(), QdrantValue::from(total as i64));
    payload.insert(
        "filename".to_string(),
        QdrantValue::from(metadata.filename.clone()),
    );
    payload.insert(
        "mime_type".to_string(),
        QdrantValue::from(metadata.mime_type.clone()),
    );
    payload.insert(
        "ingested_at".to_string(),
        QdrantValue::from(metadata.ingested_at.to_rfc3339()),
    );
    payload
}

fn scored_chunk_from_payload(
    score: f32,
    payload: HashMap<String, QdrantValue>,
) -> ScoredChunk {
    let get_string = |key: &str| {
        payload
            .get(key)
            .and_then(payload_value_to_string)
            .unwrap_or_default()
    };
    let chunk_index = payload
        .get("chunk_index")
        .and_then(payload_value_to_i64)
        .unwrap_or(0) as usize;

    ScoredChunk {
        text: get_string("text"),
        score,
        source: get_string("filename"),
        content_hash: get_string("content_hash"),
        chunk_index,
    }
}

fn payload_value_to_string(value: &QdrantValue) -> Option<String> {
    match value.kind.as_ref()? {
        qdrant_client::qdrant::value::Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn payload_value_to_i64(value: &QdrantValue) -> Option<i64> {
    match value.kind.as_ref()? {
        qdrant_client::qdrant::value::Kind::IntegerValue(i) => Some(*i),
        _ => None,
    }
}

/// Filter matching every point of one document.
fn hash_filter(content_hash: &str) -> Filter {
    Filter {
        must: vec![Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: "content_hash".to_string(),
                r#match: Some(Match {
                    match_value: Some(MatchValue::Keyword(content_hash.to_string())),
                }),
                ..Default::default()
            })),
        }],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn metadata() -> DocumentMetadata {
        DocumentMetadata {
            content_hash: "abc123".to_string(),
            filename: "contract.pdf".to_string(),
            byte_size: 42,
            mime_type: "application/pdf".to_string(),
            ingested_at: Utc::now(),
        }
    }

    #[test]
    fn test_point_id_is_deterministic() {
        assert_eq!(chunk_point_id("abc", 0), chunk_point_id("abc", 0));
        assert_ne!(chunk_point_id("abc", 0), chunk_point_id("abc", 1));
        assert_ne!(chunk_point_id("abc", 0), chunk_point_id("abd", 0));
    }

    #[test]
    fn test_point_id_is_valid_uuid() {
        let id = chunk_point_id("deadbeef", 7);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_payload_round_trip() {
        let payload = chunk_payload("clause text", &metadata(), 2, 5);
        let chunk = scored_chunk_from_payload(0.91, payload);
        assert_eq!(chunk.text, "clause text");
        assert_eq!(chunk.content_hash, "abc123");
        assert_eq!(chunk.source, "contract.pdf");
        assert_eq!(chunk.chunk_index, 2);
        assert_eq!(chunk.score, 0.91);
    }

    #[test]
    fn test_hash_filter_targets_content_hash_field() {
        let filter = hash_filter("abc123");
        assert_eq!(filter.must.len(), 1);
        let condition = filter.must[0].condition_one_of.as_ref().unwrap();
        match condition {
            ConditionOneOf::Field(f) => {
                assert_eq!(f.key, "content_hash");
            }
            _ => panic!("expected field condition"),
        }
    }

    mod integration {
        use super::super::*;
        use crate::rag::pipeline::DocumentMetadata;
        use async_trait::async_trait;
        use chrono::Utc;

        struct FixedEmbedder(Vec<f32>);

        #[async_trait]
        impl Embedder for FixedEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Ok(self.0.clone())
            }
        }

        #[tokio::test]
        #[ignore] // Requires a running qdrant instance
        async fn test_store_search_delete_cycle() {
            let store = VectorStore::connect("http://localhost:6334", "lexbot_store_test")
                .await
                .unwrap();
            let embedder = FixedEmbedder(vec![0.1; EMBEDDING_DIM as usize]);
            let metadata = DocumentMetadata {
                content_hash: "testhash".to_string(),
                filename: "t.txt".to_string(),
                byte_size: 1,
                mime_type: "text/plain".to_string(),
                ingested_at: Utc::now(),
            };

            let stored = store
                .store_chunks(
                    &["alpha".to_string(), "beta".to_string()],
                    &metadata,
                    &embedder,
                )
                .await
                .unwrap();
            assert_eq!(stored, 2);
            assert!(store.contains_document("testhash").await.unwrap());
            assert_eq!(store.chunk_count("testhash").await.unwrap(), 2);

            let results = store.search("alpha", &embedder, 5, 0.5).await.unwrap();
            assert!(!results.is_empty());

            store.delete_document("testhash").await.unwrap();
            assert!(!store.contains_document("testhash").await.unwrap());
            // Idempotent on absent documents
            store.delete_document("testhash").await.unwrap();
        }
    }
}
