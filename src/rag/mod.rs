// RAG (Retrieval-Augmented Generation) pipeline
//
// Document ingestion and query-time retrieval against an external qdrant
// collection.
//
// Components:
// - Loader: format-specific text extraction (PDF/DOCX/DOC/MD/TXT)
// - Chunker: overlapping fixed-size splitting
// - Hash: content identity for dedup
// - Embedding: external embedding API client behind the Embedder trait
// - Store: qdrant collection adapter
// - Context: token-bounded context assembly
// - Pipeline: end-to-end orchestration

pub mod chunker;
pub mod context;
pub mod embedding;
pub mod hash;
pub mod loader;
pub mod pipeline;
pub mod store;

// Re-export key types
pub use chunker::Chunker;
pub use context::{ContextBuilder, RetrievedContext};
pub use embedding::{Embedder, EmbeddingClient};
pub use hash::content_hash;
pub use loader::{load_document, DocumentFormat, LoadedDocument, MAX_DOCUMENT_BYTES};
pub use pipeline::{IngestReport, IngestStatus, RagOptions, RagPipeline};
pub use store::{ScoredChunk, StoreInfo, VectorStore};
