//! Indexing pipeline
//!
//! Drives extraction -> chunking -> embedding -> index insertion for a set of
//! documents. Re-runs are idempotent: unchanged documents are detected by
//! their chunk-id set and skipped without any embedding calls. Documents are
//! processed independently - one failing document never aborts the rest.

use crate::chunker::Chunker;
use crate::extract::DocumentExtractor;
use docqa_common::config::IndexingConfig;
use docqa_common::errors::{AppError, ErrorKind, Result};
use docqa_common::index::{EmbeddingErrorMode, EmbeddingIndex};
use docqa_common::models::Document;
use futures::stream::{self, StreamExt};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A failure recorded against one document (or one of its chunks)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexError {
    /// Filename the failure belongs to
    pub document: String,
    /// Human-readable failure description
    pub message: String,
}

/// Outcome of an indexing run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    /// Chunks embedded and written during this run
    pub chunks_indexed: usize,
    /// Chunks skipped because their document was already fully indexed
    pub chunks_skipped: usize,
    /// Documents fully indexed during this run
    pub documents_indexed: usize,
    /// Documents skipped as unchanged
    pub documents_skipped: usize,
    /// Collected per-document failures; never silently dropped
    pub errors: Vec<IndexError>,
}

/// Per-document outcome, merged into the report as tasks finish
enum DocOutcome {
    Indexed { chunks: usize, failures: Vec<IndexError> },
    Skipped { chunks: usize },
    Failed { document: String, error: AppError },
}

/// Indexing pipeline over an embedding index
pub struct IndexingPipeline {
    extractor: Arc<dyn DocumentExtractor>,
    chunker: Chunker,
    index: Arc<EmbeddingIndex>,
    max_concurrent_documents: usize,
    on_embedding_error: EmbeddingErrorMode,
}

impl IndexingPipeline {
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        chunker: Chunker,
        index: Arc<EmbeddingIndex>,
        config: &IndexingConfig,
    ) -> Self {
        Self {
            extractor,
            chunker,
            index,
            max_concurrent_documents: config.max_concurrent_documents.max(1),
            on_embedding_error: EmbeddingErrorMode::from_config(&config.on_embedding_error),
        }
    }

    /// Extract `paths` and index the resulting documents.
    ///
    /// Extraction failures are recorded per path; the remaining documents
    /// still get indexed.
    #[instrument(skip(self, paths), fields(path_count = paths.len(), reset))]
    pub async fn index_paths(&self, paths: &[PathBuf], reset: bool) -> Result<IndexReport> {
        let mut documents = Vec::with_capacity(paths.len());
        let mut errors = Vec::new();

        for path in paths {
            match self.extractor.extract(path) {
                Ok(document) => documents.push(document),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Extraction failed");
                    errors.push(IndexError {
                        document: path.display().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut report = self.index_documents(&documents, reset).await?;
        report.errors.extend(errors);
        Ok(report)
    }

    /// Index already-extracted documents.
    ///
    /// With `reset` the store is wiped first; otherwise unchanged documents
    /// (same id, same chunk set) are skipped entirely, since embedding is the
    /// expensive step.
    #[instrument(skip(self, documents), fields(document_count = documents.len(), reset))]
    pub async fn index_documents(
        &self,
        documents: &[Document],
        reset: bool,
    ) -> Result<IndexReport> {
        if reset {
            info!("Clearing vector store before indexing");
            self.index.clear()?;
        }

        let outcomes: Vec<DocOutcome> = stream::iter(
            documents
                .iter()
                .map(|document| self.index_document(document)),
        )
        .buffer_unordered(self.max_concurrent_documents)
        .collect()
        .await;

        let mut report = IndexReport::default();
        for outcome in outcomes {
            match outcome {
                DocOutcome::Indexed { chunks, failures } => {
                    report.documents_indexed += 1;
                    report.chunks_indexed += chunks;
                    report.errors.extend(failures);
                }
                DocOutcome::Skipped { chunks } => {
                    report.documents_skipped += 1;
                    report.chunks_skipped += chunks;
                }
                DocOutcome::Failed { document, error } => {
                    // A broken persistence layer invalidates the whole run;
                    // anything else stays scoped to its document.
                    if error.kind() == ErrorKind::IndexWrite {
                        return Err(error);
                    }
                    counter!("docqa_document_failures_total").increment(1);
                    report.errors.push(IndexError {
                        document,
                        message: error.to_string(),
                    });
                }
            }
        }

        counter!("docqa_documents_indexed_total").increment(report.documents_indexed as u64);
        counter!("docqa_chunks_skipped_total").increment(report.chunks_skipped as u64);

        info!(
            documents_indexed = report.documents_indexed,
            documents_skipped = report.documents_skipped,
            chunks_indexed = report.chunks_indexed,
            chunks_skipped = report.chunks_skipped,
            errors = report.errors.len(),
            "Indexing run complete"
        );

        Ok(report)
    }

    async fn index_document(&self, document: &Document) -> DocOutcome {
        match self.try_index_document(document).await {
            Ok(outcome) => outcome,
            Err(error) => DocOutcome::Failed {
                document: document.filename.clone(),
                error,
            },
        }
    }

    async fn try_index_document(&self, document: &Document) -> Result<DocOutcome> {
        let chunks = self.chunker.chunk(document)?;
        if chunks.is_empty() {
            warn!(document = %document.filename, "Document produced no chunks");
            return Ok(DocOutcome::Indexed {
                chunks: 0,
                failures: Vec::new(),
            });
        }

        let already_indexed = chunks
            .iter()
            .all(|chunk| self.index.contains(&chunk.chunk_id));
        if already_indexed {
            info!(
                document = %document.filename,
                chunk_count = chunks.len(),
                "Document unchanged, skipping"
            );
            return Ok(DocOutcome::Skipped {
                chunks: chunks.len(),
            });
        }

        let insert = self.index.insert(&chunks, self.on_embedding_error).await?;
        let failures = insert
            .failures
            .into_iter()
            .map(|failure| IndexError {
                document: document.filename.clone(),
                message: failure.error.to_string(),
            })
            .collect();

        Ok(DocOutcome::Indexed {
            chunks: insert.inserted,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PdfExtractor;
    use docqa_common::config::{ChunkingConfig, IndexingConfig};
    use docqa_common::embeddings::MockEmbedder;
    use docqa_common::store::MemoryStore;
    use docqa_common::tokenizer::WhitespaceTokenizer;

    fn chunking_config(window: usize, overlap_fraction: f64) -> ChunkingConfig {
        ChunkingConfig {
            window_tokens: window,
            overlap_fraction,
            boundary_lookback_fraction: 0.0,
            tokenizer: "whitespace".to_string(),
        }
    }

    fn pipeline_with(
        chunking: &ChunkingConfig,
        on_error: &str,
    ) -> (IndexingPipeline, Arc<EmbeddingIndex>) {
        let index = Arc::new(EmbeddingIndex::new(
            Arc::new(MockEmbedder::new(128)),
            Arc::new(MemoryStore::new()),
            16,
        ));
        let pipeline = IndexingPipeline::new(
            Arc::new(PdfExtractor::new()),
            Chunker::new(Arc::new(WhitespaceTokenizer), chunking),
            Arc::clone(&index),
            &IndexingConfig {
                max_concurrent_documents: 4,
                on_embedding_error: on_error.to_string(),
            },
        );
        (pipeline, index)
    }

    fn pipeline(window: usize, on_error: &str) -> (IndexingPipeline, Arc<EmbeddingIndex>) {
        pipeline_with(&chunking_config(window, 0.2), on_error)
    }

    fn words(prefix: &str, n: usize) -> String {
        (0..n)
            .map(|i| format!("{}{}", prefix, i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn document(name: &str, text: &str) -> Document {
        Document::from_pages(name, vec![(1, text.to_string())]).unwrap()
    }

    #[tokio::test]
    async fn test_indexing_populates_the_store() {
        let (pipeline, index) = pipeline(10, "abort");
        let docs = vec![document("a.pdf", &words("alpha", 25))];

        let report = pipeline.index_documents(&docs, false).await.unwrap();
        assert_eq!(report.documents_indexed, 1);
        assert!(report.chunks_indexed >= 2);
        assert!(report.errors.is_empty());
        assert_eq!(index.len(), report.chunks_indexed);
    }

    #[tokio::test]
    async fn test_reindexing_is_idempotent() {
        let (pipeline, index) = pipeline(10, "abort");
        let docs = vec![document("a.pdf", &words("alpha", 25))];

        let first = pipeline.index_documents(&docs, false).await.unwrap();
        let len_after_first = index.len();

        let second = pipeline.index_documents(&docs, false).await.unwrap();
        assert_eq!(second.chunks_indexed, 0);
        assert_eq!(second.chunks_skipped, first.chunks_indexed);
        assert_eq!(second.documents_skipped, 1);
        assert_eq!(index.len(), len_after_first);
    }

    #[tokio::test]
    async fn test_reset_clears_previous_content() {
        let (pipeline, index) = pipeline(10, "abort");
        let doc_a = document("a.pdf", &words("alpha", 25));
        let doc_b = document("b.pdf", &words("beta", 12));

        pipeline.index_documents(&[doc_a], false).await.unwrap();
        let report = pipeline
            .index_documents(std::slice::from_ref(&doc_b), true)
            .await
            .unwrap();

        assert_eq!(index.len(), report.chunks_indexed);
        let results = index.query_text("beta0 beta1 beta2", 3).await.unwrap();
        assert!(results.iter().all(|r| r.filename == "b.pdf"));
    }

    #[tokio::test]
    async fn test_failing_document_does_not_abort_the_rest() {
        let (pipeline, index) = pipeline(10, "abort");
        // The second document is punctuation-only: chunkable, but the
        // embedder rejects it as malformed input
        let docs = vec![
            document("good.pdf", &words("gamma", 12)),
            document("bad.pdf", "?! ?! ?! ?! ?!"),
        ];

        let report = pipeline.index_documents(&docs, false).await.unwrap();
        assert_eq!(report.documents_indexed, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].document, "bad.pdf");
        assert!(index.len() > 0);
    }

    #[tokio::test]
    async fn test_skip_mode_records_chunk_failures_per_document() {
        let (pipeline, _index) = pipeline(4, "skip");
        // One page mixing valid windows with a punctuation-only window
        let text = format!("{} ?! ?! ?! ?! {}", words("delta", 4), words("eps", 4));
        let docs = vec![document("mixed.pdf", &text)];

        let report = pipeline.index_documents(&docs, false).await.unwrap();
        assert_eq!(report.documents_indexed, 1);
        assert!(report.chunks_indexed >= 2);
        assert!(!report.errors.is_empty());
        assert_eq!(report.errors[0].document, "mixed.pdf");
    }

    #[tokio::test]
    async fn test_unreadable_path_is_isolated() {
        let (pipeline, _index) = pipeline(10, "abort");
        let report = pipeline
            .index_paths(&[PathBuf::from("/nope/missing.pdf")], false)
            .await
            .unwrap();

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.chunks_indexed, 0);
    }

    #[tokio::test]
    async fn test_notice_period_document_indexes_page_four() {
        // Zero overlap and a window of 16 keep the whole page-4 sentence in
        // its own chunk
        let (pipeline, index) = pipeline_with(&chunking_config(16, 0.0), "abort");
        let document = Document::from_pages(
            "employment.pdf",
            vec![
                (1, words("intro", 10)),
                (2, words("salary", 10)),
                (3, words("vacation", 10)),
                (
                    4,
                    "Notice period is one month at month-end after the probation period."
                        .to_string(),
                ),
            ],
        )
        .unwrap();

        pipeline
            .index_documents(std::slice::from_ref(&document), false)
            .await
            .unwrap();

        let results = index
            .query_text("What is the notice period after probation?", 3)
            .await
            .unwrap();
        assert_eq!(results[0].page, 4);
        assert_eq!(results[0].filename, "employment.pdf");
        assert!(results[0].text.contains("Notice period"));
    }
}
