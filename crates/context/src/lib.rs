//! DocQA Context Engine
//!
//! Answer-side of the pipeline:
//! - `llm` - language-model clients behind the `LanguageModel` trait
//! - `composer` - constrained prompt construction, citations, and the
//!   insufficient-context short-circuit
//! - `engine` - the per-question facade wiring retrieval, composition, and
//!   cost accounting into one session report

pub mod composer;
pub mod engine;
pub mod llm;

pub use composer::{Answer, AnswerComposer, Citation, INSUFFICIENT_CONTEXT_ANSWER};
pub use engine::{QaEngine, SessionReport};
pub use llm::{Completion, LanguageModel, MockLanguageModel, OpenAiChatModel};
