//! Content hashing for document identity and dedup

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of extracted document text.
///
/// The digest is the document's identity in the vector store: re-uploading
/// a file with identical extracted text maps to the same hash regardless of
/// filename.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
