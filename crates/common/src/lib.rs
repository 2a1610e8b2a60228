//! DocQA Common Library
//!
//! Shared code for the DocQA retrieval core:
//! - Core data model (documents, pages, chunks)
//! - Tokenizer abstraction (chunk sizing and overlap are token-denominated)
//! - Embedding client abstraction
//! - Vector store and embedding index
//! - Cost accounting
//! - Error types, configuration, and observability helpers

pub mod config;
pub mod cost;
pub mod embeddings;
pub mod errors;
pub mod index;
pub mod metrics;
pub mod models;
pub mod store;
pub mod telemetry;
pub mod tokenizer;

// Re-export commonly used types
pub use config::AppConfig;
pub use cost::{CostTracker, PriceTable, QuerySession};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use index::{EmbeddingErrorMode, EmbeddingIndex};
pub use models::{Chunk, Document, PageText};
pub use store::{RetrievalResult, VectorStore};
pub use tokenizer::Tokenizer;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
