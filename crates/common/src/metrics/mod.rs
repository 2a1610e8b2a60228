//! Metrics naming and registration
//!
//! All metrics use the `docqa_` prefix. Call `register_metrics` once at
//! startup so exporters render descriptions and units; the counters
//! themselves are emitted from the pipeline, retriever, composer, and cost
//! tracker.

use metrics::{describe_counter, describe_histogram, Unit};

/// Metrics prefix for all DocQA metrics
pub const METRICS_PREFIX: &str = "docqa";

/// Register all metric descriptions
pub fn register_metrics() {
    // Indexing metrics
    describe_counter!(
        "docqa_documents_indexed_total",
        Unit::Count,
        "Documents fully indexed"
    );

    describe_counter!(
        "docqa_document_failures_total",
        Unit::Count,
        "Documents that failed to index"
    );

    describe_counter!(
        "docqa_chunks_indexed_total",
        Unit::Count,
        "Chunks embedded and written to the vector store"
    );

    describe_counter!(
        "docqa_chunks_skipped_total",
        Unit::Count,
        "Chunks skipped because their document was already indexed"
    );

    describe_counter!(
        "docqa_embedding_failures_total",
        Unit::Count,
        "Chunks that failed to embed"
    );

    // Query metrics
    describe_counter!(
        "docqa_queries_total",
        Unit::Count,
        "Questions answered (including insufficient-context answers)"
    );

    describe_histogram!(
        "docqa_retrieval_results_count",
        Unit::Count,
        "Results returned per retrieval after dedup"
    );

    describe_histogram!(
        "docqa_query_duration_seconds",
        Unit::Seconds,
        "End-to-end question latency in seconds"
    );

    // Cost metrics
    describe_counter!(
        "docqa_llm_prompt_tokens_total",
        Unit::Count,
        "Prompt tokens billed by the language model"
    );

    describe_counter!(
        "docqa_llm_completion_tokens_total",
        Unit::Count,
        "Completion tokens billed by the language model"
    );
}
