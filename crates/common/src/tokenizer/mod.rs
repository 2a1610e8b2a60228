//! Tokenizer abstraction
//!
//! Chunk windowing, overlap counting, and retrieval dedup are all expressed
//! in tokens, so the tokenizer is an explicit injected dependency rather than
//! an implementation detail - swapping it changes chunk-size semantics in one
//! place, reproducibly.
//!
//! The default is the cl100k_base BPE (the vocabulary used by the OpenAI
//! embedding and chat models this crate talks to), so chunk token counts line
//! up with what the APIs bill.

use crate::errors::{AppError, Result};
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Trait for text tokenization
pub trait Tokenizer: Send + Sync {
    /// Tokenizer identifier, recorded for reproducibility
    fn name(&self) -> &'static str;

    /// Split `text` into token pieces.
    ///
    /// Concatenating the returned pieces reproduces `text` exactly; this is
    /// what lets the chunker rebuild window text from token ranges.
    fn split(&self, text: &str) -> Result<Vec<String>>;

    /// Number of tokens in `text`
    fn count(&self, text: &str) -> usize;
}

/// cl100k_base BPE tokenizer
pub struct Cl100kTokenizer {
    bpe: CoreBPE,
}

impl Cl100kTokenizer {
    /// Load the embedded cl100k_base vocabulary
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| AppError::Configuration {
            message: format!("failed to load cl100k_base vocabulary: {}", e),
        })?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for Cl100kTokenizer {
    fn name(&self) -> &'static str {
        "cl100k_base"
    }

    fn split(&self, text: &str) -> Result<Vec<String>> {
        self.bpe
            .split_by_token(text, true)
            .map_err(|e| AppError::Internal {
                message: format!("cl100k_base segmentation failed: {}", e),
            })
    }

    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Word-level tokenizer: each piece is a word plus its trailing whitespace.
///
/// Deterministic and dependency-free; used as an offline fallback and by
/// tests that assert exact token counts.
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn name(&self) -> &'static str {
        "whitespace"
    }

    fn split(&self, text: &str) -> Result<Vec<String>> {
        let mut pieces = Vec::new();
        let mut current = String::new();
        let mut in_trailing_ws = false;

        for ch in text.chars() {
            if ch.is_whitespace() {
                in_trailing_ws = true;
                current.push(ch);
            } else {
                if in_trailing_ws {
                    pieces.push(std::mem::take(&mut current));
                    in_trailing_ws = false;
                }
                current.push(ch);
            }
        }
        if !current.is_empty() {
            pieces.push(current);
        }

        Ok(pieces)
    }

    fn count(&self, text: &str) -> usize {
        self.split(text).map(|p| p.len()).unwrap_or(0)
    }
}

/// Create a tokenizer based on configuration
pub fn create_tokenizer(name: &str) -> Result<Arc<dyn Tokenizer>> {
    match name {
        "cl100k_base" => Ok(Arc::new(Cl100kTokenizer::new()?)),
        "whitespace" => Ok(Arc::new(WhitespaceTokenizer)),
        other => {
            tracing::warn!(tokenizer = other, "Unknown tokenizer, using cl100k_base");
            Ok(Arc::new(Cl100kTokenizer::new()?))
        }
    }
}
