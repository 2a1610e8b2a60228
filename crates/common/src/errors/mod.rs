//! Error types for the DocQA retrieval core
//!
//! Provides one shared error taxonomy with:
//! - Distinct variants for each failure mode in the pipeline
//! - A retryable/permanent classification for transient upstream failures
//! - Conversions from the library errors that cross module boundaries

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Coarse failure classes, used for logging and metrics labels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Configuration,
    Extraction,
    Embedding,
    IndexWrite,
    Generation,
    Internal,
}

impl ErrorKind {
    /// Stable label for metrics/log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Extraction => "extraction",
            ErrorKind::Embedding => "embedding",
            ErrorKind::IndexWrite => "index_write",
            ErrorKind::Generation => "generation",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // Extraction errors (fatal to the affected document only)
    #[error("Extraction failed for '{document}': {message}")]
    Extraction { document: String, message: String },

    // Embedding errors
    #[error("Embedding request failed: {message}")]
    EmbeddingRequest { message: String, retryable: bool },

    #[error("Embedding failed for chunk {chunk_id}: {message}")]
    Embedding {
        chunk_id: String,
        message: String,
        retryable: bool,
    },

    #[error("Embedding timed out after {timeout_ms}ms")]
    EmbeddingTimeout { timeout_ms: u64 },

    // Persistence errors (fatal, never a silent partial index)
    #[error("Index write failed: {message}")]
    IndexWrite { message: String },

    // Language-model errors
    #[error("Generation failed: {message}")]
    Generation { message: String, retryable: bool },

    #[error("Generation timed out after {timeout_ms}ms")]
    GenerationTimeout { timeout_ms: u64 },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for validation failures
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for index-write failures
    pub fn index_write(message: impl Into<String>) -> Self {
        AppError::IndexWrite {
            message: message.into(),
        }
    }

    /// Tag a raw embedding failure with the chunk that triggered it
    pub fn for_chunk(self, chunk_id: impl Into<String>) -> Self {
        match self {
            AppError::EmbeddingRequest { message, retryable } => AppError::Embedding {
                chunk_id: chunk_id.into(),
                message,
                retryable,
            },
            AppError::EmbeddingTimeout { timeout_ms } => AppError::Embedding {
                chunk_id: chunk_id.into(),
                message: format!("timed out after {}ms", timeout_ms),
                retryable: true,
            },
            other => other,
        }
    }

    /// Get the coarse failure class for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation { .. } => ErrorKind::Validation,
            AppError::Configuration { .. } => ErrorKind::Configuration,
            AppError::Extraction { .. } => ErrorKind::Extraction,
            AppError::EmbeddingRequest { .. }
            | AppError::Embedding { .. }
            | AppError::EmbeddingTimeout { .. } => ErrorKind::Embedding,
            AppError::IndexWrite { .. } => ErrorKind::IndexWrite,
            AppError::Generation { .. } | AppError::GenerationTimeout { .. } => {
                ErrorKind::Generation
            }
            AppError::Internal { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may reasonably retry the failed operation.
    ///
    /// Timeouts and rate-limit style upstream failures are retryable;
    /// malformed input and persistence failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::EmbeddingRequest { retryable, .. }
            | AppError::Embedding { retryable, .. }
            | AppError::Generation { retryable, .. } => *retryable,
            AppError::EmbeddingTimeout { .. } | AppError::GenerationTimeout { .. } => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = AppError::Embedding {
            chunk_id: "abc".into(),
            message: "boom".into(),
            retryable: false,
        };
        assert_eq!(err.kind(), ErrorKind::Embedding);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeouts_are_retryable() {
        assert!(AppError::EmbeddingTimeout { timeout_ms: 30_000 }.is_retryable());
        assert!(AppError::GenerationTimeout { timeout_ms: 30_000 }.is_retryable());
        assert!(!AppError::index_write("disk full").is_retryable());
    }

    #[test]
    fn test_for_chunk_tags_request_failures() {
        let err = AppError::EmbeddingRequest {
            message: "API error 500".into(),
            retryable: true,
        }
        .for_chunk("chunk-7");

        match err {
            AppError::Embedding {
                chunk_id,
                retryable,
                ..
            } => {
                assert_eq!(chunk_id, "chunk-7");
                assert!(retryable);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
