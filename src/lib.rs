//! lexbot - Legal-document RAG chatbot core
//!
//! The retrieval pipeline and chat layer behind a Discord legal assistant:
//! documents are extracted, deduplicated by content hash, chunked with
//! overlap, embedded through an external API, and stored in qdrant; at
//! query time a token-bounded context is retrieved and injected into the
//! OpenRouter completion call.
//!
//! # Architecture
//!
//! - [`rag`]: ingestion and retrieval pipeline (loader, chunker, hasher,
//!   embedding client, vector store adapter, orchestrator)
//! - [`chat`]: OpenRouter client, per-channel history, message assembly
//! - [`moderation`]: JSON-file moderation log for the bot shell
//! - [`cli`]: terminal front-end standing in for the Discord shell

pub mod chat;
pub mod config;
pub mod errors;
pub mod moderation;
pub mod rag;

// Re-export commonly used types
pub use config::BotConfig;
pub use errors::{ApiErrorKind, BotError, Result};

// Terminal front-end
pub mod cli;
