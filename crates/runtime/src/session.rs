//! Session management and the tool-calling loop.

use thiserror::Error;
use uuid::Uuid;

use crate::conversation::Conversation;
use crate::llm::{
    CompletionClient, CompletionRequest, FinishReason, GenerationParams, Message, ToolCall,
};
use crate::skill::Skill;
use crate::tools::ToolHost;

/// Default cap on completion rounds per turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 30;

/// Characters of tool output kept in a [`ToolCallRecord`].
const RESULT_PREVIEW_CHARS: usize = 200;

/// Why a turn ended without a final answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnFailure {
    #[error("completion failed: {0}")]
    Completion(String),

    #[error("round limit exceeded after {rounds} rounds")]
    RoundLimitExceeded { rounds: usize },

    #[error("model stopped unexpectedly: {0}")]
    UnexpectedFinish(FinishReason),
}

/// Audit entry for one executed tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: String,
    /// Tool output, truncated for display.
    pub result: String,
}

impl ToolCallRecord {
    fn new(call: &ToolCall, result: &str) -> Self {
        Self {
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            result: preview(result),
        }
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(RESULT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Outcome of [`Session::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    /// Final assistant text, or a description of the failure.
    pub response: String,
    /// Every tool call executed during the turn, in order.
    pub tool_calls: Vec<ToolCallRecord>,
    pub success: bool,
    pub error: Option<TurnFailure>,
}

impl TurnResult {
    fn done(response: String, tool_calls: Vec<ToolCallRecord>) -> Self {
        Self {
            response,
            tool_calls,
            success: true,
            error: None,
        }
    }

    fn failed(failure: TurnFailure, tool_calls: Vec<ToolCallRecord>) -> Self {
        Self {
            response: failure.to_string(),
            tool_calls,
            success: false,
            error: Some(failure),
        }
    }
}

/// A conversation session.
///
/// Turns must not overlap; `send_message` takes `&mut self` for that reason.
pub struct Session<C, T> {
    pub id: Uuid,
    client: C,
    tools: T,
    conversation: Conversation,
    max_tool_rounds: usize,
    params: GenerationParams,
}

impl<C: CompletionClient, T: ToolHost> Session<C, T> {
    /// Create a new session over a completion client and a tool host.
    pub fn new(client: C, tools: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            client,
            tools,
            conversation: Conversation::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            params: GenerationParams::default(),
        }
    }

    /// Set the completion round cap. Values below 1 are raised to 1.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Use `skill` as the system prompt.
    pub fn load_skill(&mut self, skill: &Skill) {
        tracing::debug!(session = %self.id, skill = %skill.name, "loading skill");
        self.conversation.load_system_prompt(skill.system_prompt());
    }

    pub fn load_system_prompt(&mut self, text: impl Into<String>) {
        self.conversation.load_system_prompt(text);
    }

    /// Drop the history, keeping the system prompt.
    pub fn clear_history(&mut self) {
        self.conversation.clear();
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    /// Run one turn: ask the model, execute any tool calls it requests and
    /// feed the results back until it answers or the round cap is hit.
    ///
    /// Tool calls run one at a time in the order the model listed them.
    pub async fn send_message(&mut self, input: impl Into<String>) -> TurnResult {
        self.conversation.append(Message::user(input));
        let mut records = Vec::new();

        for round in 1..=self.max_tool_rounds {
            let specs = self.tools.specs().await;
            tracing::debug!(
                session = %self.id,
                round,
                messages = self.conversation.len(),
                tools = specs.len(),
                "requesting completion"
            );

            let request = CompletionRequest {
                messages: self.conversation.messages(),
                tools: &specs,
                params: self.params,
            };
            let completion = match self.client.complete(request).await {
                Ok(completion) => completion,
                Err(e) => {
                    tracing::warn!(session = %self.id, round, error = %e, "completion failed");
                    return TurnResult::failed(TurnFailure::Completion(e.to_string()), records);
                }
            };

            if completion.has_tool_calls() {
                let calls = completion.tool_calls;
                tracing::debug!(session = %self.id, round, calls = calls.len(), "dispatching tools");
                self.conversation
                    .append(Message::tool_calls(completion.text, calls.clone()));

                for call in &calls {
                    tracing::info!(session = %self.id, tool = %call.name, call_id = %call.id, "executing tool");
                    let output = self.tools.execute(call).await;
                    records.push(ToolCallRecord::new(call, &output));
                    self.conversation.append(Message::tool(&call.id, output));
                }
                continue;
            }

            if completion.finish_reason == FinishReason::Stop {
                let text = completion.text.unwrap_or_default();
                self.conversation.append(Message::assistant(text.clone()));
                return TurnResult::done(text, records);
            }

            tracing::warn!(
                session = %self.id,
                round,
                reason = %completion.finish_reason,
                "unexpected finish"
            );
            return TurnResult::failed(
                TurnFailure::UnexpectedFinish(completion.finish_reason),
                records,
            );
        }

        tracing::warn!(session = %self.id, rounds = self.max_tool_rounds, "round limit exceeded");
        TurnResult::failed(
            TurnFailure::RoundLimitExceeded {
                rounds: self.max_tool_rounds,
            },
            records,
        )
    }
}
