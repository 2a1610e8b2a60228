//! Answer composition
//!
//! Builds the constrained prompt - a fixed instruction block, the retrieved
//! chunks tagged with their provenance, and the question - and attaches
//! citations to the model's answer. With no retrieved context the composer
//! answers deterministically without calling the model at all: an
//! empty-context prompt invites fabrication and still costs money.

use crate::llm::LanguageModel;
use docqa_common::errors::Result;
use docqa_common::store::RetrievalResult;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, instrument};

/// The fixed answer returned when retrieval produced nothing usable
pub const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "The indexed documents do not contain the information needed to answer this question. \
     Try rephrasing the question or indexing additional documents.";

/// Instruction block prepended to every prompt
const PROMPT_INSTRUCTIONS: &str = "\
Answer the question using ONLY the context sections below. Rules:
1. Base every statement on the provided sections; do not use outside knowledge.
2. If the sections do not contain the answer, say exactly that instead of guessing.
3. When you use a section, mention its source tag, e.g. [1].
4. Be precise and concise.";

/// A (filename, page) provenance pair attached to an answer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub filename: String,
    pub page: u32,
}

/// A composed answer with provenance and the billed token counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,

    /// Distinct (filename, page) pairs of the chunks in the prompt, in the
    /// order first referenced
    pub citations: Vec<Citation>,

    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Composes grounded answers from retrieved context
pub struct AnswerComposer {
    model: Arc<dyn LanguageModel>,
}

impl AnswerComposer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Build the prompt from `results`, call the model, attach citations.
    ///
    /// Empty `results` short-circuits to the fixed insufficient-context
    /// answer with no model call and zero token usage.
    #[instrument(skip(self, question, results), fields(result_count = results.len()))]
    pub async fn compose(&self, question: &str, results: &[RetrievalResult]) -> Result<Answer> {
        if results.is_empty() {
            debug!("No retrieved context, skipping model call");
            return Ok(Answer {
                text: INSUFFICIENT_CONTEXT_ANSWER.to_string(),
                citations: Vec::new(),
                prompt_tokens: 0,
                completion_tokens: 0,
            });
        }

        let prompt = build_prompt(question, results);
        let citations = collect_citations(results);

        let completion = self.model.complete(&prompt).await?;
        debug!(
            model = self.model.model_name(),
            prompt_tokens = completion.prompt_tokens,
            completion_tokens = completion.completion_tokens,
            "Answer generated"
        );

        Ok(Answer {
            text: completion.text,
            citations,
            prompt_tokens: completion.prompt_tokens,
            completion_tokens: completion.completion_tokens,
        })
    }
}

/// Instruction block, tagged context sections, then the question
fn build_prompt(question: &str, results: &[RetrievalResult]) -> String {
    let mut prompt = String::from(PROMPT_INSTRUCTIONS);
    prompt.push_str("\n\nContext sections:\n");

    for (i, result) in results.iter().enumerate() {
        let _ = write!(
            prompt,
            "\n[{}] {}, page {}\n{}\n",
            i + 1,
            result.filename,
            result.page,
            result.text.trim()
        );
    }

    let _ = write!(prompt, "\nQuestion: {}\nAnswer:", question);
    prompt
}

/// Distinct (filename, page) pairs in first-referenced order
fn collect_citations(results: &[RetrievalResult]) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();
    for result in results {
        let citation = Citation {
            filename: result.filename.clone(),
            page: result.page,
        };
        if !citations.contains(&citation) {
            citations.push(citation);
        }
    }
    citations
}
