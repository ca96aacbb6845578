//! Grounded answer synthesis on top of hybrid retrieval.

pub mod generator;
pub mod orchestrator;
pub mod prompt;

pub use generator::{GeminiGenerator, Generator};
pub use orchestrator::{Answer, AnswerOrchestrator};
pub use prompt::{build_prompt, NOT_FOUND_ANSWER};
