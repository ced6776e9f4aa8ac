//! Error types for the lexbot chatbot core
//!
//! One flat taxonomy for every failure the pipeline and the chat layer can
//! produce, with a retryable/fatal split on the two external-API variants.

use thiserror::Error;

/// Classification of an external-API failure.
///
/// Callers use [`BotError::is_retryable`] to decide whether retrying can
/// help; the kind itself is kept for logging and user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// HTTP 429 from the provider
    RateLimited,
    /// The outbound request hit its per-call timeout
    Timeout,
    /// HTTP 401/403, bad or missing API key
    Auth,
    /// HTTP 5xx, provider-side transient failure
    Server,
    /// Anything else: unexpected status, malformed body
    Other,
}

impl ApiErrorKind {
    /// Rate limits, timeouts, and server errors are worth retrying;
    /// auth failures and malformed responses are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiErrorKind::RateLimited | ApiErrorKind::Timeout | ApiErrorKind::Server
        )
    }
}

/// Main error type for the lexbot system
#[derive(Error, Debug)]
pub enum BotError {
    /// Missing or invalid settings, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document format not in the allow-list
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Document exceeds the ingestion size ceiling
    #[error("Document too large: {size} bytes exceeds maximum {max} bytes")]
    TooLarge { size: u64, max: u64 },

    /// Underlying parser could not read the document (corrupt/encrypted)
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// Embedding API failure
    #[error("Embedding API error ({kind:?}): {message}")]
    Embedding { kind: ApiErrorKind, message: String },

    /// Vector store failure
    #[error("Vector store error: {0}")]
    Store(String),

    /// Chat completion API failure
    #[error("Completion API error ({kind:?}): {message}")]
    Completion { kind: ApiErrorKind, message: String },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// True when the failure is transient and a caller-side retry may
    /// succeed. Only the embedding and completion variants can be
    /// retryable; everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        match self {
            BotError::Embedding { kind, .. } | BotError::Completion { kind, .. } => {
                kind.is_retryable()
            }
            _ => false,
        }
    }
}

/// Result type alias for lexbot operations
pub type Result<T> = std::result::Result<T, BotError>;
