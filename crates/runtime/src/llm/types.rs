//! Core completion types (provider-agnostic).
//!
//! These types represent the universal concepts shared across providers.
//! Provider-specific details belong in adapter modules.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::CompletionError;

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier supplied by the provider, echoed back on the result.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Raw JSON object text. Empty means no arguments.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

impl Message {
    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::System {
            content: text.into(),
        }
    }

    /// Create a user message with text.
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: text.into(),
        }
    }

    /// Create an assistant message with text.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant message requesting tool calls.
    pub fn tool_calls(text: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: text,
            tool_calls: calls,
        }
    }

    /// Create a tool result message.
    pub fn tool(call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self::Tool {
            call_id: call_id.into(),
            content: result.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
        }
    }

    /// Text content, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::System { content } | Self::User { content } | Self::Tool { content, .. } => {
                Some(content)
            }
            Self::Assistant { content, .. } => content.as_deref(),
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }
}

/// Tool specification exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for input parameters.
    pub parameters: Value,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FinishReason {
    /// Natural end of response.
    #[default]
    Stop,
    /// Model wants to call tools.
    ToolCalls,
    /// Hit token limit.
    Length,
    /// Content filtered.
    ContentFilter,
    /// Unknown reason (forward compatibility).
    Unknown(String),
}

impl FinishReason {
    /// Map a provider's finish reason string.
    pub fn parse(s: &str) -> Self {
        match s {
            "stop" | "end_turn" => Self::Stop,
            "tool_calls" | "function_call" | "tool_use" => Self::ToolCalls,
            "length" | "max_tokens" => Self::Length,
            "content_filter" => Self::ContentFilter,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::ToolCalls => write!(f, "tool_calls"),
            Self::Length => write!(f, "length"),
            Self::ContentFilter => write!(f, "content_filter"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GenerationParams {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Everything needed for a completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
    pub params: GenerationParams,
}

/// The model's answer to one request.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Assistant text, if any.
    pub text: Option<String>,
    /// Requested tool calls, in the order the model emitted them.
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl Completion {
    /// A plain text answer with a stop signal.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A batch of tool calls.
    pub fn calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            finish_reason: FinishReason::ToolCalls,
            ..Self::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Trait for completion providers.
///
/// Implementations turn an ordered message history plus tool specs into
/// either assistant text or a batch of tool calls.
pub trait CompletionClient: Send + Sync {
    fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> impl Future<Output = Result<Completion, CompletionError>> + Send;
}
