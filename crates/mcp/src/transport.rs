//! Transport-agnostic client operations.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{ServerConfig, TransportKind};
use crate::error::{Error, Result};
use crate::http::HttpTransport;
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, ListToolsParams,
    ListToolsResult, Tool,
};
use crate::stdio::StdioTransport;

/// A live channel to one tool server.
pub enum Transport {
    Stdio(StdioTransport),
    Http(HttpTransport),
}

impl From<StdioTransport> for Transport {
    fn from(transport: StdioTransport) -> Self {
        Self::Stdio(transport)
    }
}

impl From<HttpTransport> for Transport {
    fn from(transport: HttpTransport) -> Self {
        Self::Http(transport)
    }
}

impl Transport {
    /// Open a channel to the configured server and complete the handshake.
    ///
    /// On failure the partially opened channel is closed before returning.
    pub async fn connect<F>(config: &ServerConfig, base_dir: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String> + Send,
    {
        let transport: Self = match config.transport {
            TransportKind::Stdio => StdioTransport::spawn(config, base_dir, lookup)?.into(),
            TransportKind::Http => HttpTransport::new(config)?.into(),
        };

        match transport.initialize().await {
            Ok(info) => {
                tracing::debug!(
                    server = %config.name,
                    remote = %info.server_info.name,
                    protocol = %info.protocol_version,
                    "handshake complete"
                );
                Ok(transport)
            }
            Err(e) => {
                transport.close().await;
                Err(e)
            }
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        match self {
            Self::Stdio(t) => t.name(),
            Self::Http(t) => t.name(),
        }
    }

    /// Perform the `initialize` handshake.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let result: InitializeResult = self
            .request("initialize", Some(InitializeParams::default()))
            .await?;
        self.notify("notifications/initialized", None::<()>).await?;
        Ok(result)
    }

    /// List every tool the server exposes, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let mut tools = Vec::new();
        let mut cursor = None;
        loop {
            let page: ListToolsResult = self
                .request("tools/list", Some(ListToolsParams { cursor }))
                .await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }
    }

    /// Call a tool and return its text output.
    ///
    /// `arguments_json` is the raw JSON object text; empty means no
    /// arguments.
    pub async fn call_tool(&self, name: &str, arguments_json: &str) -> Result<String> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments: parse_arguments(arguments_json)?,
        };

        let result: CallToolResult = self.request("tools/call", Some(params)).await?;
        let text = result.text();
        if result.is_error {
            return Err(Error::ToolCallFailed(text));
        }
        Ok(text)
    }

    /// Release the process or network session. Safe to call more than once.
    pub async fn close(&self) {
        match self {
            Self::Stdio(t) => t.close().await,
            Self::Http(t) => t.close().await,
        }
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        match self {
            Self::Stdio(t) => t.request(method, params).await,
            Self::Http(t) => t.request(method, params).await,
        }
    }

    async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<()>
    where
        P: Serialize,
    {
        match self {
            Self::Stdio(t) => t.notify(method, params).await,
            Self::Http(t) => t.notify(method, params).await,
        }
    }
}

fn parse_arguments(arguments_json: &str) -> Result<Option<Value>> {
    if arguments_json.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(arguments_json) {
        Ok(Value::Object(map)) => Ok(Some(Value::Object(map))),
        Ok(Value::Null) => Ok(None),
        Ok(other) => Err(Error::InvalidArguments(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(Error::InvalidArguments(e.to_string())),
    }
}
