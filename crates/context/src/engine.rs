//! Question-answering engine
//!
//! The per-session facade: retrieve -> compose -> account. Components do not
//! know about each other; the engine wires them and exposes the session
//! report surface the presentation layer consumes. Each engine owns its own
//! cost tracker, so concurrent sessions bill independently.

use crate::composer::{AnswerComposer, Citation};
use docqa_common::cost::{CostTracker, QuerySession};
use docqa_common::errors::Result;
use docqa_search::Retriever;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

/// What the presentation layer gets back for one answered question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub answer_text: String,
    pub citations: Vec<Citation>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,

    /// Cost of this call in USD (0 when the model was not called)
    pub cost_this_call_usd: f64,

    /// Running total for the session
    pub cumulative_cost_usd: f64,
}

/// Retrieval-augmented question answering over an indexed corpus
pub struct QaEngine {
    retriever: Retriever,
    composer: AnswerComposer,
    cost: Arc<CostTracker>,
    session_id: Uuid,
}

impl QaEngine {
    pub fn new(retriever: Retriever, composer: AnswerComposer, cost: Arc<CostTracker>) -> Self {
        Self {
            retriever,
            composer,
            cost,
            session_id: Uuid::new_v4(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Snapshot of the session's cumulative usage
    pub fn session(&self) -> QuerySession {
        self.cost.snapshot()
    }

    /// Answer one question.
    ///
    /// The query is atomic from the caller's perspective: it either returns a
    /// report or fails as a whole, and a failed query never touches the
    /// session's cost state.
    #[instrument(skip(self, question), fields(session_id = %self.session_id))]
    pub async fn ask(&self, question: &str) -> Result<SessionReport> {
        let started = Instant::now();

        let results = self
            .retriever
            .retrieve(question, self.retriever.default_top_k())
            .await?;
        let answer = self.composer.compose(question, &results).await?;

        // Only a completed model call is billed; the short-circuit answer
        // reports zero usage
        let cost_this_call_usd = if answer.prompt_tokens + answer.completion_tokens > 0 {
            self.cost.record(answer.prompt_tokens, answer.completion_tokens)
        } else {
            0.0
        };

        counter!("docqa_queries_total").increment(1);
        histogram!("docqa_query_duration_seconds").record(started.elapsed().as_secs_f64());

        let report = SessionReport {
            answer_text: answer.text,
            citations: answer.citations,
            prompt_tokens: answer.prompt_tokens,
            completion_tokens: answer.completion_tokens,
            cost_this_call_usd,
            cumulative_cost_usd: self.cost.session_total(),
        };

        info!(
            citations = report.citations.len(),
            cost_usd = report.cost_this_call_usd,
            cumulative_usd = report.cumulative_cost_usd,
            "Question answered"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLanguageModel;
    use docqa_common::config::{ChunkingConfig, IndexingConfig};
    use docqa_common::cost::PriceTable;
    use docqa_common::embeddings::MockEmbedder;
    use docqa_common::index::EmbeddingIndex;
    use docqa_common::models::Document;
    use docqa_common::store::MemoryStore;
    use docqa_common::tokenizer::WhitespaceTokenizer;
    use docqa_ingestion::extract::PdfExtractor;
    use docqa_ingestion::{Chunker, IndexingPipeline};
    use docqa_search::RetrievalOptions;

    fn prices() -> PriceTable {
        PriceTable {
            version: "test-v1".to_string(),
            prompt_usd_per_1k: 1.0,
            completion_usd_per_1k: 2.0,
        }
    }

    fn engine_over(
        index: Arc<EmbeddingIndex>,
        model: Arc<MockLanguageModel>,
    ) -> QaEngine {
        let retriever = Retriever::new(
            index,
            Arc::new(WhitespaceTokenizer),
            RetrievalOptions {
                top_k: 3,
                min_score: 0.0,
                dedup_overlap: 0.5,
            },
        );
        QaEngine::new(
            retriever,
            AnswerComposer::new(model),
            Arc::new(CostTracker::new(prices())),
        )
    }

    fn empty_index() -> Arc<EmbeddingIndex> {
        Arc::new(EmbeddingIndex::new(
            Arc::new(MockEmbedder::new(128)),
            Arc::new(MemoryStore::new()),
            16,
        ))
    }

    async fn indexed_employment_contract(index: &Arc<EmbeddingIndex>) {
        let chunking = ChunkingConfig {
            window_tokens: 16,
            overlap_fraction: 0.0,
            boundary_lookback_fraction: 0.0,
            tokenizer: "whitespace".to_string(),
        };
        let pipeline = IndexingPipeline::new(
            Arc::new(PdfExtractor::new()),
            Chunker::new(Arc::new(WhitespaceTokenizer), &chunking),
            Arc::clone(index),
            &IndexingConfig {
                max_concurrent_documents: 2,
                on_embedding_error: "abort".to_string(),
            },
        );

        let document = Document::from_pages(
            "employment.pdf",
            vec![
                (1, "intro0 intro1 intro2 intro3 intro4 intro5 intro6 intro7".to_string()),
                (2, "salary0 salary1 salary2 salary3 salary4 salary5 salary6".to_string()),
                (3, "vacation0 vacation1 vacation2 vacation3 vacation4".to_string()),
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
    }

    #[tokio::test]
    async fn test_end_to_end_answer_cites_page_four() {
        let index = empty_index();
        indexed_employment_contract(&index).await;

        let model = Arc::new(MockLanguageModel::new(
            "The notice period is one month at month-end. [1]",
            120,
            20,
        ));
        let engine = engine_over(index, model.clone());

        let report = engine
            .ask("What is the notice period after probation?")
            .await
            .unwrap();

        assert!(report.answer_text.contains("one month"));
        assert!(report
            .citations
            .iter()
            .any(|c| c.filename == "employment.pdf" && c.page == 4));
        // The best match is the page-4 chunk, so it is the first citation
        assert_eq!(report.citations[0].page, 4);

        let prompt = model.last_prompt().unwrap();
        assert!(prompt.contains("employment.pdf, page 4"));
        assert!(prompt.contains("Notice period"));

        // 120 prompt tokens at $1/1k + 20 completion tokens at $2/1k
        assert!((report.cost_this_call_usd - 0.16).abs() < 1e-9);
        assert!((report.cumulative_cost_usd - 0.16).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_costs_accumulate_across_questions() {
        let index = empty_index();
        indexed_employment_contract(&index).await;

        let model = Arc::new(MockLanguageModel::new("An answer. [1]", 100, 50));
        let engine = engine_over(index, model);

        let first = engine.ask("What is the notice period?").await.unwrap();
        let second = engine.ask("What about probation?").await.unwrap();

        assert!(second.cumulative_cost_usd > first.cumulative_cost_usd);
        assert!(
            (second.cumulative_cost_usd
                - (first.cost_this_call_usd + second.cost_this_call_usd))
                .abs()
                < 1e-9
        );

        let session = engine.session();
        assert_eq!(session.cumulative_prompt_tokens, 200);
        assert_eq!(session.cumulative_completion_tokens, 100);
    }

    #[tokio::test]
    async fn test_empty_index_answers_without_model_or_cost() {
        let model = Arc::new(MockLanguageModel::new("never", 10, 10));
        let engine = engine_over(empty_index(), model.clone());

        let report = engine.ask("anything?").await.unwrap();

        assert_eq!(model.call_count(), 0);
        assert!(report.citations.is_empty());
        assert_eq!(report.cost_this_call_usd, 0.0);
        assert_eq!(report.cumulative_cost_usd, 0.0);
    }

    #[tokio::test]
    async fn test_failed_generation_leaves_cost_state_untouched() {
        let index = empty_index();
        indexed_employment_contract(&index).await;

        let model = Arc::new(MockLanguageModel::failing());
        let engine = engine_over(index, model);

        let err = engine.ask("What is the notice period?").await.unwrap_err();
        assert!(err.is_retryable());

        let session = engine.session();
        assert_eq!(session.cumulative_prompt_tokens, 0);
        assert_eq!(session.cumulative_cost_usd, 0.0);
    }
}
