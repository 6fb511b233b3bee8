//! Completion provider adapters.
//!
//! Each provider implements [`CompletionClient`](crate::llm::CompletionClient)
//! for its specific API.

mod openai;

pub use openai::{OpenAiBackend, OpenAiBackendBuilder, OpenAiEndpoint};
