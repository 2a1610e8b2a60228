//! Question-to-context retrieval
//!
//! The retriever owns no state of its own; it drives the embedding index
//! (which guarantees the question is embedded and normalized exactly like the
//! chunks were) and post-processes the matches: a minimum-similarity floor,
//! then near-duplicate removal so overlapping windows from the same page do
//! not crowd out diverse evidence.

mod dedup;

use docqa_common::config::RetrievalConfig;
use docqa_common::errors::{AppError, Result};
use docqa_common::index::EmbeddingIndex;
use docqa_common::store::RetrievalResult;
use docqa_common::tokenizer::Tokenizer;
use metrics::histogram;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Tuning knobs for retrieval post-processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOptions {
    /// Default number of chunks per question
    pub top_k: usize,

    /// Matches scoring below this are dropped
    pub min_score: f32,

    /// Same-page results sharing more than this token-overlap ratio are
    /// collapsed onto the highest-scoring one
    pub dedup_overlap: f32,
}

impl RetrievalOptions {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            min_score: config.min_score,
            dedup_overlap: config.dedup_overlap,
        }
    }
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

/// Retrieves relevant chunks for a question
pub struct Retriever {
    index: Arc<EmbeddingIndex>,
    tokenizer: Arc<dyn Tokenizer>,
    options: RetrievalOptions,
}

impl Retriever {
    pub fn new(
        index: Arc<EmbeddingIndex>,
        tokenizer: Arc<dyn Tokenizer>,
        options: RetrievalOptions,
    ) -> Self {
        Self {
            index,
            tokenizer,
            options,
        }
    }

    /// The configured default top-k
    pub fn default_top_k(&self) -> usize {
        self.options.top_k
    }

    /// Retrieve up to `top_k` chunks for `question`, best match first.
    ///
    /// An empty index or a question with no sufficiently similar chunks
    /// yields an empty list - that is the insufficient-context signal, not an
    /// error.
    #[instrument(skip(self, question), fields(top_k))]
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        if question.trim().is_empty() {
            return Err(AppError::validation("question must not be empty"));
        }

        // Nothing indexed: skip the embedding call entirely
        if self.index.is_empty() {
            debug!("Vector store is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        let results = self.index.query_text(question, top_k).await?;
        let before_filter = results.len();

        let filtered: Vec<RetrievalResult> = results
            .into_iter()
            .filter(|r| r.similarity_score >= self.options.min_score)
            .collect();

        let deduped = dedup::collapse_overlapping(
            filtered,
            self.tokenizer.as_ref(),
            self.options.dedup_overlap,
        );

        debug!(
            raw = before_filter,
            kept = deduped.len(),
            min_score = self.options.min_score,
            "Retrieval complete"
        );
        histogram!("docqa_retrieval_results_count").record(deduped.len() as f64);

        Ok(deduped)
    }
}
