//! Chunk entity - the atomic retrieval unit

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use validator::Validate;

/// A bounded, overlapping window of document text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Chunk {
    /// Deterministic id derived from (document_id, sequence_index)
    #[validate(length(min = 1))]
    pub chunk_id: String,

    /// Window text
    #[validate(length(min = 1))]
    pub text: String,

    /// Token count under the tokenizer the chunker was built with
    #[validate(range(min = 1))]
    pub token_count: usize,

    /// Source file name, for citations
    #[validate(length(min = 1))]
    pub source_filename: String,

    /// Page containing the first token of this chunk (1-based)
    #[validate(range(min = 1))]
    pub source_page: u32,

    /// Owning document id
    #[validate(length(min = 1))]
    pub document_id: String,

    /// Position of this chunk within its document
    pub sequence_index: usize,
}

impl Chunk {
    /// Construct a validated chunk
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_id: impl Into<String>,
        source_filename: impl Into<String>,
        sequence_index: usize,
        source_page: u32,
        text: impl Into<String>,
        token_count: usize,
    ) -> Result<Self> {
        let document_id = document_id.into();
        let chunk = Self {
            chunk_id: Self::derive_id(&document_id, sequence_index),
            text: text.into(),
            token_count,
            source_filename: source_filename.into(),
            source_page,
            document_id,
            sequence_index,
        };

        chunk.validate().map_err(|e| AppError::Validation {
            message: format!("invalid chunk: {}", e),
        })?;

        Ok(chunk)
    }

    /// Deterministic chunk id: hex SHA-256 of `{document_id}:{sequence_index}`.
    ///
    /// Re-chunking the same document yields the same ids, which is what turns
    /// re-indexing into an upsert instead of a duplication.
    pub fn derive_id(document_id: &str, sequence_index: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(document_id.as_bytes());
        hasher.update(b":");
        hasher.update(sequence_index.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_deterministic() {
        assert_eq!(Chunk::derive_id("doc", 3), Chunk::derive_id("doc", 3));
        assert_ne!(Chunk::derive_id("doc", 3), Chunk::derive_id("doc", 4));
        assert_ne!(Chunk::derive_id("doc", 3), Chunk::derive_id("other", 3));
    }

    #[test]
    fn test_new_validates() {
        let ok = Chunk::new("doc", "a.pdf", 0, 1, "some text", 2);
        assert!(ok.is_ok());

        assert!(Chunk::new("doc", "a.pdf", 0, 0, "some text", 2).is_err());
        assert!(Chunk::new("doc", "a.pdf", 0, 1, "", 2).is_err());
        assert!(Chunk::new("doc", "a.pdf", 0, 1, "some text", 0).is_err());
        assert!(Chunk::new("doc", "", 0, 1, "some text", 2).is_err());
    }
}
