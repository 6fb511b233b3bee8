//! HTTP transport: JSON-RPC messages POSTed to a remote endpoint.
//!
//! Responses arrive either as a plain `application/json` body or as a
//! `text/event-stream` whose `data:` events carry JSON-RPC messages.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::stdio::{DEFAULT_TIMEOUT, MAX_OUTPUT_SIZE};

const SESSION_HEADER: &str = "Mcp-Session-Id";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// JSON-RPC channel to a server behind an HTTP endpoint.
pub struct HttpTransport {
    name: String,
    endpoint: Url,
    client: reqwest::Client,
    session_id: Mutex<Option<String>>,
    next_id: AtomicI64,
    closed: AtomicBool,
    timeout: Duration,
}

impl HttpTransport {
    /// Validate the endpoint and prepare a client. No request is sent yet.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::Config(format!(
                "HTTP server '{}' requires an endpoint",
                config.name
            )));
        }
        let endpoint = Url::parse(endpoint).map_err(|e| {
            Error::Config(format!("HTTP server '{}' has invalid endpoint: {e}", config.name))
        })?;

        Ok(Self {
            name: config.name.clone(),
            endpoint,
            client: reqwest::Client::new(),
            session_id: Mutex::new(None),
            next_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
            timeout: DEFAULT_TIMEOUT,
        })
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
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }

        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p)?;
        }

        let req = self.post().await.json(&request);
        let response = req.send().await?;
        self.remember_session(&response).await;

        let status = response.status();
        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::InvalidResponse(format!("HTTP {status}: {body}")));
        }
        if body.len() > MAX_OUTPUT_SIZE {
            return Err(Error::OutputTooLarge {
                size: body.len(),
                max: MAX_OUTPUT_SIZE,
            });
        }

        let response = if is_event_stream {
            parse_event_stream(&body, &id)?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&body)
                .map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))?
        };

        let result_value = response.into_result()?;
        serde_json::from_value(result_value)
            .map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))
    }

    /// Send a notification (no response expected).
    pub async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<()>
    where
        P: Serialize,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }

        let mut notification = JsonRpcNotification::new(method);
        if let Some(p) = params {
            notification.params = Some(serde_json::to_value(p)?);
        }

        let response = self.post().await.json(&notification).send().await?;
        self.remember_session(&response).await;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::InvalidResponse(format!(
                "HTTP {status} for notification {method}"
            )));
        }
        Ok(())
    }

    /// End the session on the server (best effort). Safe to call more than
    /// once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let Some(session_id) = self.session_id.lock().await.take() else {
            return;
        };

        let result = self
            .client
            .delete(self.endpoint.clone())
            .header(SESSION_HEADER, session_id)
            .timeout(self.timeout)
            .send()
            .await;
        if let Err(e) = result {
            tracing::debug!(server = %self.name, error = %e, "session delete failed");
        }
    }

    async fn post(&self) -> RequestBuilder {
        let mut req = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, ACCEPT_BOTH)
            .timeout(self.timeout);
        if let Some(session_id) = self.session_id.lock().await.as_deref() {
            req = req.header(SESSION_HEADER, session_id);
        }
        req
    }

    async fn remember_session(&self, response: &reqwest::Response) {
        let header = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Some(session_id) = header {
            *self.session_id.lock().await = Some(session_id.to_string());
        }
    }
}

/// Find the response for `id` among the events of an SSE body.
fn parse_event_stream(body: &str, id: &RequestId) -> Result<JsonRpcResponse> {
    let mut data = String::new();

    // A trailing empty line terminates the final event.
    for line in body.lines().chain(std::iter::once("")) {
        if let Some(payload) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(payload.strip_prefix(' ').unwrap_or(payload));
            continue;
        }

        if line.is_empty() && !data.is_empty() {
            if let Ok(response) = serde_json::from_str::<JsonRpcResponse>(&data) {
                if response.answers(id) {
                    return Ok(response);
                }
            }
            data.clear();
        }
    }

    Err(Error::InvalidResponse(
        "event stream ended without a response".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_endpoint_is_config_error() {
        let config = ServerConfig::http("remote", "  ");
        let err = HttpTransport::new(&config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_endpoint_is_config_error() {
        let config = ServerConfig::http("remote", "not a url");
        let err = HttpTransport::new(&config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn event_stream_picks_matching_response() {
        let body = concat!(
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\",\"params\":{}}\n",
            "\n",
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":7,\n",
            "data: \"result\":{\"tools\":[]}}\n",
        );
        let response = parse_event_stream(body, &RequestId::Number(7)).unwrap();
        assert_eq!(response.into_result().unwrap(), serde_json::json!({"tools": []}));
    }

    #[test]
    fn event_stream_without_answer_is_invalid() {
        let body = "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n";
        let err = parse_event_stream(body, &RequestId::Number(2)).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_connection_error() {
        let config = ServerConfig::http("down", "http://127.0.0.1:1/mcp");
        let transport = HttpTransport::new(&config)
            .unwrap()
            .with_timeout(Duration::from_secs(2));
        let err = transport
            .request::<(), serde_json::Value>("ping", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Connection, "{err:?}");
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let transport = HttpTransport::new(&ServerConfig::http("remote", "http://127.0.0.1:1/")).unwrap();
        transport.close().await;
        transport.close().await;
        let err = transport
            .request::<(), serde_json::Value>("ping", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Closed));
    }
}
