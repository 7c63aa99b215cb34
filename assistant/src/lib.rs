pub mod cost;
pub mod judge;
pub mod llm;
pub mod pipeline;
pub mod prompt;

pub use judge::{Relevance, RelevanceVerdict};
pub use llm::{Completion, Generator, LlmConfig, OpenAiClient, TokenUsage};
pub use pipeline::{AnswerData, Assistant};
