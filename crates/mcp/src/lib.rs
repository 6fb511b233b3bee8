//! MCP (Model Context Protocol) client library.
//!
//! This crate speaks the tool-server protocol with a single server, either a
//! child process over stdio or a remote endpoint over HTTP.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{ServerConfig, Transport};
//! use std::path::Path;
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ServerConfig::stdio(
//!     "filesystem",
//!     "npx",
//!     ["-y", "@modelcontextprotocol/server-filesystem", "./workspace"],
//! );
//!
//! let server = Transport::connect(&config, Path::new("."), |key| std::env::var(key).ok()).await?;
//!
//! for tool in server.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let text = server
//!     .call_tool("read_file", r#"{"path": "./README.md"}"#)
//!     .await?;
//! println!("{text}");
//!
//! server.close().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod http;
mod protocol;
mod stdio;
mod transport;

pub use config::{ServerConfig, TransportKind, resolve_arg};
pub use error::{Error, ErrorKind, Result};
pub use http::HttpTransport;
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsParams, ListToolsResult,
    PROTOCOL_VERSION, RequestId, ServerCapabilities, ServerInfo, Tool, ToolContent,
};
pub use stdio::{DEFAULT_TIMEOUT, MAX_OUTPUT_SIZE, StdioTransport};
pub use transport::Transport;
