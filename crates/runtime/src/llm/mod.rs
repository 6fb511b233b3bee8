//! Completion protocol types and client trait.

pub mod errors;
pub mod types;

pub use errors::CompletionError;
pub use types::{
    Completion, CompletionClient, CompletionRequest, FinishReason, GenerationParams, Message,
    Role, ToolCall, ToolSpec, Usage,
};
