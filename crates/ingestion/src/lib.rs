//! DocQA Ingestion
//!
//! Turns source files into indexed chunks:
//! - `extract` - PDF text extraction behind the `DocumentExtractor` seam
//! - `chunker` - overlapping token windows with page provenance
//! - `pipeline` - extraction -> chunking -> embedding -> index insertion,
//!   idempotent across re-runs and isolated per document

pub mod chunker;
pub mod extract;
pub mod pipeline;

pub use chunker::Chunker;
pub use extract::{DocumentExtractor, PdfExtractor};
pub use pipeline::{IndexReport, IndexingPipeline};
