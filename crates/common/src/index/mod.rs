//! Embedding index
//!
//! Wraps an embedder and a vector store: chunks go in (embedded once,
//! normalized, upserted), nearest-neighbor queries come out. Query embeddings
//! run through the same embedder and the same normalization as inserts, so
//! embedding-space consistency holds by construction.

use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use crate::models::Chunk;
use crate::store::{EmbeddingRecord, RecordMetadata, RetrievalResult, VectorStore};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Behavior when a chunk fails to embed during insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingErrorMode {
    /// Record the failure and keep going with the remaining chunks
    SkipAndContinue,
    /// Stop at the first failing chunk
    Abort,
}

impl EmbeddingErrorMode {
    /// Parse the configured mode, defaulting to skip-and-continue
    pub fn from_config(value: &str) -> Self {
        match value {
            "abort" => EmbeddingErrorMode::Abort,
            "skip" => EmbeddingErrorMode::SkipAndContinue,
            other => {
                warn!(mode = other, "Unknown on_embedding_error mode, using skip");
                EmbeddingErrorMode::SkipAndContinue
            }
        }
    }
}

/// A chunk that could not be embedded
#[derive(Debug)]
pub struct InsertFailure {
    pub chunk_id: String,
    pub error: AppError,
}

/// Outcome of an insert call
#[derive(Debug, Default)]
pub struct InsertReport {
    /// Chunks embedded and written
    pub inserted: usize,
    /// Chunks that failed to embed (skip-and-continue mode only)
    pub failures: Vec<InsertFailure>,
}

/// Embedding index over a vector store
pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl EmbeddingIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, batch_size: usize) -> Self {
        Self {
            embedder,
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed and upsert `chunks`.
    ///
    /// Each chunk's text is embedded exactly once. Chunks are embedded in
    /// batches; when a whole batch fails the chunks are retried one by one so
    /// the failure is attributed to the offending chunk id. A chunk is either
    /// fully written (vector + metadata) or not written at all.
    #[instrument(skip(self, chunks), fields(chunk_count = chunks.len()))]
    pub async fn insert(
        &self,
        chunks: &[Chunk],
        on_error: EmbeddingErrorMode,
    ) -> Result<InsertReport> {
        let mut report = InsertReport::default();

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            match self.embedder.embed_batch(&texts).await {
                Ok(vectors) => {
                    for (chunk, vector) in batch.iter().zip(vectors.into_iter()) {
                        self.write_record(chunk, vector, on_error, &mut report)?;
                    }
                }
                Err(batch_error) => {
                    debug!(error = %batch_error, "Batch embedding failed, retrying per chunk");
                    for chunk in batch {
                        match self.embedder.embed(&chunk.text).await {
                            Ok(vector) => {
                                self.write_record(chunk, vector, on_error, &mut report)?;
                            }
                            Err(e) => {
                                self.record_failure(
                                    chunk,
                                    e.for_chunk(&chunk.chunk_id),
                                    on_error,
                                    &mut report,
                                )?;
                            }
                        }
                    }
                }
            }
        }

        self.store.flush()?;
        counter!("docqa_chunks_indexed_total").increment(report.inserted as u64);
        Ok(report)
    }

    fn write_record(
        &self,
        chunk: &Chunk,
        vector: Vec<f32>,
        on_error: EmbeddingErrorMode,
        report: &mut InsertReport,
    ) -> Result<()> {
        let Some(vector) = normalized(vector) else {
            let error = AppError::Embedding {
                chunk_id: chunk.chunk_id.clone(),
                message: "embedding has zero norm".to_string(),
                retryable: false,
            };
            return self.record_failure(chunk, error, on_error, report);
        };

        // Store failures are fatal in every mode: a broken persistence layer
        // must never look like a partially indexed corpus.
        self.store.upsert(EmbeddingRecord {
            chunk_id: chunk.chunk_id.clone(),
            vector,
            metadata: RecordMetadata {
                filename: chunk.source_filename.clone(),
                page: chunk.source_page,
                document_id: chunk.document_id.clone(),
            },
            text: chunk.text.clone(),
        })?;

        report.inserted += 1;
        Ok(())
    }

    fn record_failure(
        &self,
        chunk: &Chunk,
        error: AppError,
        on_error: EmbeddingErrorMode,
        report: &mut InsertReport,
    ) -> Result<()> {
        counter!("docqa_embedding_failures_total").increment(1);
        match on_error {
            EmbeddingErrorMode::Abort => Err(error),
            EmbeddingErrorMode::SkipAndContinue => {
                warn!(chunk_id = %chunk.chunk_id, error = %error, "Skipping chunk");
                report.failures.push(InsertFailure {
                    chunk_id: chunk.chunk_id.clone(),
                    error,
                });
                Ok(())
            }
        }
    }

    /// Query with an already-computed vector
    pub fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        let vector = normalized(vector.to_vec())
            .ok_or_else(|| AppError::validation("query vector has zero norm"))?;
        self.store.query(&vector, top_k)
    }

    /// Embed `text` with the index's own embedder, then query
    pub async fn query_text(&self, text: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        let vector = self.embedder.embed(text).await?;
        self.query(&vector, top_k)
    }

    /// Remove every record from the underlying store
    pub fn clear(&self) -> Result<()> {
        self.store.delete_all()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Whether a chunk id is already indexed
    pub fn contains(&self, chunk_id: &str) -> bool {
        self.store.contains(chunk_id)
    }

    /// The embedder backing this index
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}

/// L2-normalize, rejecting zero vectors
fn normalized(mut vector: Vec<f32>) -> Option<Vec<f32>> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON || !norm.is_finite() {
        return None;
    }
    for value in &mut vector {
        *value /= norm;
    }
    Some(vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbedder;
    use crate::store::MemoryStore;

    fn index() -> EmbeddingIndex {
        EmbeddingIndex::new(
            Arc::new(MockEmbedder::new(128)),
            Arc::new(MemoryStore::new()),
            8,
        )
    }

    fn chunk(seq: usize, text: &str) -> Chunk {
        Chunk::new("doc-1", "contract.pdf", seq, 1, text, text.split_whitespace().count())
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_then_reinsert_is_idempotent() {
        let index = index();
        let chunks = vec![chunk(0, "alpha beta gamma"), chunk(1, "delta epsilon zeta")];

        let first = index
            .insert(&chunks, EmbeddingErrorMode::Abort)
            .await
            .unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(index.len(), 2);

        let second = index
            .insert(&chunks, EmbeddingErrorMode::Abort)
            .await
            .unwrap();
        assert_eq!(second.inserted, 2);
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_identical_text_is_the_top_result_with_max_score() {
        let index = index();
        let chunks = vec![
            chunk(0, "the notice period is one month"),
            chunk(1, "vacation allowance is thirty days"),
        ];
        index
            .insert(&chunks, EmbeddingErrorMode::Abort)
            .await
            .unwrap();

        let results = index
            .query_text("the notice period is one month", 2)
            .await
            .unwrap();
        assert_eq!(results[0].chunk_id, chunks[0].chunk_id);
        assert!((results[0].similarity_score - 1.0).abs() < 1e-5);
        assert!(results[0].similarity_score >= results[1].similarity_score);
    }

    #[tokio::test]
    async fn test_skip_mode_records_failures_and_continues() {
        let index = index();
        // Punctuation-only text survives chunk validation but the embedder
        // rejects it as malformed input
        let chunks = vec![chunk(0, "valid words here"), chunk(1, "?!?! --- !!")];

        let report = index
            .insert(&chunks, EmbeddingErrorMode::SkipAndContinue)
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].chunk_id, chunks[1].chunk_id);
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_abort_mode_stops_on_first_failure() {
        let index = index();
        let chunks = vec![chunk(0, "?!?!"), chunk(1, "valid words here")];

        let err = index
            .insert(&chunks, EmbeddingErrorMode::Abort)
            .await
            .unwrap_err();
        match err {
            AppError::Embedding { chunk_id, .. } => assert_eq!(chunk_id, chunks[0].chunk_id),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clear_empties_the_index() {
        let index = index();
        index
            .insert(&[chunk(0, "some text")], EmbeddingErrorMode::Abort)
            .await
            .unwrap();
        index.clear().unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_error_mode_parsing() {
        assert_eq!(
            EmbeddingErrorMode::from_config("abort"),
            EmbeddingErrorMode::Abort
        );
        assert_eq!(
            EmbeddingErrorMode::from_config("skip"),
            EmbeddingErrorMode::SkipAndContinue
        );
        assert_eq!(
            EmbeddingErrorMode::from_config("???"),
            EmbeddingErrorMode::SkipAndContinue
        );
    }
}
