//! DocQA Search
//!
//! Query-time retrieval: embeds a question with the same embedder the index
//! was built with, pulls the top-k nearest chunks, and assembles a
//! deduplicated, similarity-ordered context with citation metadata.

pub mod retrieval;

pub use retrieval::{RetrievalOptions, Retriever};
