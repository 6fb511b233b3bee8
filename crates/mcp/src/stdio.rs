//! Stdio transport: a server spawned as a child process, speaking
//! newline-delimited JSON-RPC over its stdin/stdout.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};

/// Default timeout for a single request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum output size (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

struct Channel {
    reader: Reader,
    writer: Writer,
}

/// JSON-RPC channel to a server over a pair of byte streams.
///
/// Normally the streams are a child's stdout/stdin; [`StdioTransport::from_io`]
/// accepts any pair, which is how tests stand up an in-process server.
pub struct StdioTransport {
    name: String,
    child: Mutex<Option<Child>>,
    channel: Mutex<Option<Channel>>,
    next_id: AtomicI64,
    timeout: Duration,
}

impl StdioTransport {
    /// Spawn the configured command.
    ///
    /// Relative path arguments are rooted at `base_dir`; empty environment
    /// values are filled in through `lookup`.
    pub fn spawn<F>(config: &ServerConfig, base_dir: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if config.command.is_empty() {
            return Err(Error::Config(format!(
                "stdio server '{}' has no command",
                config.name
            )));
        }

        let mut cmd = Command::new(&config.command);
        cmd.args(config.resolved_args(base_dir))
            .envs(config.resolved_env(lookup))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn().map_err(Error::Spawn)?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        let mut transport = Self::from_io(&config.name, BufReader::new(stdout), stdin);
        transport.child = Mutex::new(Some(process));
        Ok(transport)
    }

    /// Build a transport over an arbitrary reader/writer pair.
    pub fn from_io<R, W>(name: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            name: name.into(),
            child: Mutex::new(None),
            channel: Mutex::new(Some(Channel {
                reader: Box::new(reader),
                writer: Box::new(writer),
            })),
            next_id: AtomicI64::new(1),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a request and wait for the matching response.
    pub async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p)?;
        }
        let request_json = serde_json::to_string(&request)?;

        // Hold the channel for the whole exchange so responses cannot be
        // picked up by a concurrent caller.
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(Error::Closed)?;

        write_line(&mut channel.writer, &request_json).await?;

        let response = timeout(self.timeout, read_response(&mut channel.reader, &id))
            .await
            .map_err(|_| Error::Timeout)??;

        let result_value = response.into_result()?;
        let result: R = serde_json::from_value(result_value)
            .map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))?;

        Ok(result)
    }

    /// Send a notification (no response expected).
    pub async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<()>
    where
        P: Serialize,
    {
        let mut notification = JsonRpcNotification::new(method);
        if let Some(p) = params {
            notification.params = Some(serde_json::to_value(p)?);
        }
        let notification_json = serde_json::to_string(&notification)?;

        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(Error::Closed)?;
        write_line(&mut channel.writer, &notification_json).await
    }

    /// Check if the child process is still running.
    ///
    /// Transports built with [`StdioTransport::from_io`] report `true` until
    /// closed.
    pub async fn is_running(&self) -> bool {
        if self.channel.lock().await.is_none() {
            return false;
        }
        match self.child.lock().await.as_mut() {
            Some(process) => matches!(process.try_wait(), Ok(None)),
            None => true,
        }
    }

    /// Close the channel and terminate the child process.
    ///
    /// Safe to call more than once.
    pub async fn close(&self) {
        // Dropping stdin lets well-behaved servers exit on EOF.
        self.channel.lock().await.take();

        if let Some(mut process) = self.child.lock().await.take() {
            if let Err(e) = process.kill().await {
                tracing::debug!(server = %self.name, error = %e, "kill failed");
            }
        }
    }
}

async fn write_line(writer: &mut Writer, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Read lines until the response for `id` arrives.
///
/// Blank lines, non-JSON output and messages for other ids are skipped.
async fn read_response(reader: &mut Reader, id: &RequestId) -> Result<JsonRpcResponse> {
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(Error::ServerExited);
        }

        if line.len() > MAX_OUTPUT_SIZE {
            return Err(Error::OutputTooLarge {
                size: line.len(),
                max: MAX_OUTPUT_SIZE,
            });
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<JsonRpcResponse>(trimmed) {
            Ok(response) if response.answers(id) => return Ok(response),
            Ok(_) => continue,
            Err(_) => {
                tracing::debug!(line = %trimmed, "skipping non JSON-RPC output");
                continue;
            }
        }
    }
}
