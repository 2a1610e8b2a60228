//! Core data model entities
//!
//! Fixed, typed records validated at construction. Every entity that crosses
//! a component boundary lives here so ingestion, search, and composition all
//! agree on the same shapes.

pub mod chunk;
pub mod document;

pub use chunk::Chunk;
pub use document::{Document, PageText};
