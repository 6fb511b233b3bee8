//! Skillchat runtime: tool servers, conversation state and the tool loop.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **ToolServerManager**: connects the configured MCP servers, keeps the
//!   tool registry and routes tool calls to the owning server.
//! - **CompletionClient**: a trait abstracting model providers
//!   (OpenAI, Azure OpenAI).
//! - **Conversation**: the ordered message log with a single leading system
//!   prompt.
//! - **Session**: runs a turn, alternating between the model and tools until
//!   the model answers or the round cap is hit.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mcp::ServerConfig;
//! use runtime::{OpenAiBackend, OpenAiEndpoint, Session, ToolServerManager};
//!
//! # async fn example() -> runtime::Result<()> {
//! let manager = Arc::new(ToolServerManager::new(vec![ServerConfig::stdio(
//!     "filesystem",
//!     "npx",
//!     ["-y", "@modelcontextprotocol/server-filesystem", "."],
//! )]));
//! manager.initialize().await;
//!
//! let backend = OpenAiBackend::builder(OpenAiEndpoint::openai("sk-..."), "gpt-4o").build()?;
//! let mut session = Session::new(backend, Arc::clone(&manager));
//! session.load_system_prompt("You are a helpful assistant.");
//!
//! let turn = session.send_message("List the files here").await;
//! println!("{}", turn.response);
//!
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod conversation;
mod error;
pub mod llm;
mod providers;
mod session;
mod skill;
pub mod tools;

pub use conversation::Conversation;
pub use error::{Error, Result};
pub use llm::{
    Completion, CompletionClient, CompletionError, CompletionRequest, FinishReason,
    GenerationParams, Message, Role, ToolCall, ToolSpec, Usage,
};
pub use providers::{OpenAiBackend, OpenAiBackendBuilder, OpenAiEndpoint};
pub use session::{DEFAULT_MAX_TOOL_ROUNDS, Session, ToolCallRecord, TurnFailure, TurnResult};
pub use skill::{Skill, SkillResource};
pub use tools::{
    Connector, EmptyToolHost, ProcessConnector, ToolDescriptor, ToolHost, ToolRegistry,
    ToolServerManager,
};
