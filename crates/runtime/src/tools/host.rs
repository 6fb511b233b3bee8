//! Tool host trait.

use std::future::Future;
use std::sync::Arc;

use crate::llm::{ToolCall, ToolSpec};

/// Trait for tool execution hosts.
///
/// This is the boundary between the model loop and side effects. Failures
/// are returned as result text so the model can see and react to them.
pub trait ToolHost: Send + Sync {
    /// Get available tool specifications.
    fn specs(&self) -> impl Future<Output = Vec<ToolSpec>> + Send;

    /// Execute a tool call and return its output text.
    fn execute(&self, call: &ToolCall) -> impl Future<Output = String> + Send;
}

impl<T: ToolHost> ToolHost for Arc<T> {
    fn specs(&self) -> impl Future<Output = Vec<ToolSpec>> + Send {
        (**self).specs()
    }

    fn execute(&self, call: &ToolCall) -> impl Future<Output = String> + Send {
        (**self).execute(call)
    }
}

/// A no-op tool host with no tools.
///
/// Useful for plain chat or when no servers are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyToolHost;

impl ToolHost for EmptyToolHost {
    async fn specs(&self) -> Vec<ToolSpec> {
        Vec::new()
    }

    async fn execute(&self, call: &ToolCall) -> String {
        format!("Error: Tool '{}' not found.", call.name)
    }
}
