//! MCP error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

/// Coarse classification of an [`Error`], used by callers that only need to
/// decide whether a server is unusable or a single call went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server configuration is incomplete (e.g. missing endpoint).
    Configuration,
    /// The process or network channel could not be opened or was lost.
    Connection,
    /// The server answered with something that is not valid protocol.
    Protocol,
    /// The tool itself failed or rejected its input.
    ToolExecution,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid server config: {0}")]
    Config(String),

    #[error("failed to spawn server: {0}")]
    Spawn(std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server exited unexpectedly")]
    ServerExited,

    #[error("connection closed")]
    Closed,

    #[error("timeout waiting for response")]
    Timeout,

    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("output too large: {size} bytes (max {max})")]
    OutputTooLarge { size: usize, max: usize },
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Spawn(_)
            | Self::Io(_)
            | Self::Http(_)
            | Self::ServerExited
            | Self::Closed
            | Self::Timeout => ErrorKind::Connection,
            Self::Serialize(_)
            | Self::InvalidResponse(_)
            | Self::JsonRpc(_)
            | Self::OutputTooLarge { .. } => ErrorKind::Protocol,
            Self::InvalidArguments(_) | Self::ToolCallFailed(_) => ErrorKind::ToolExecution,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            Error::Config("no endpoint".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::Spawn(std::io::Error::other("nope")).kind(),
            ErrorKind::Connection
        );
        assert_eq!(Error::ServerExited.kind(), ErrorKind::Connection);
        assert_eq!(
            Error::InvalidResponse("garbage".into()).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            Error::ToolCallFailed("boom".into()).kind(),
            ErrorKind::ToolExecution
        );
    }
}
