//! In-process tool servers for tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use mcp::{ServerConfig, StdioTransport, Transport, TransportKind};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

use super::connector::Connector;

/// In-process server exposing `tools`. `tools/call` answers with
/// `<server>:<tool>:<arguments>`; a tool named `boom` reports an error.
fn fake_server(server: &str, tools: Vec<String>) -> Transport {
    let (client_side, server_side) = duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client_side);
    let (server_read, mut server_write) = tokio::io::split(server_side);
    let server_name = server.to_string();

    tokio::spawn(async move {
        let mut lines = BufReader::new(server_read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let msg: Value = serde_json::from_str(&line).unwrap();
            let Some(id) = msg.get("id").cloned() else {
                continue;
            };
            let result = match msg["method"].as_str().unwrap() {
                "initialize" => json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": server_name}
                }),
                "tools/list" => json!({
                    "tools": tools
                        .iter()
                        .map(|t| json!({"name": t, "description": format!("{t} on {server_name}")}))
                        .collect::<Vec<_>>()
                }),
                "tools/call" if msg["params"]["name"] == "boom" => json!({
                    "content": [{"type": "text", "text": "exploded"}],
                    "isError": true
                }),
                "tools/call" => {
                    let text = format!(
                        "{server_name}:{}:{}",
                        msg["params"]["name"].as_str().unwrap(),
                        msg["params"]["arguments"]
                    );
                    json!({"content": [{"type": "text", "text": text}]})
                }
                other => panic!("unexpected method {other}"),
            };
            let reply = json!({"jsonrpc": "2.0", "id": id, "result": result});
            if server_write
                .write_all(format!("{reply}\n").as_bytes())
                .await
                .is_err()
            {
                break;
            }
        }
    });

    StdioTransport::from_io(server, BufReader::new(client_read), client_write).into()
}

/// Hands out fake servers by name; unknown names fail like a missing
/// binary.
#[derive(Default)]
pub(crate) struct FakeConnector {
    servers: HashMap<String, Vec<String>>,
    pub(crate) connects: AtomicUsize,
}

impl FakeConnector {
    pub(crate) fn server(mut self, name: &str, tools: &[&str]) -> Self {
        self.servers.insert(
            name.to_string(),
            tools.iter().map(|t| t.to_string()).collect(),
        );
        self
    }
}

impl Connector for FakeConnector {
    async fn connect(&self, config: &ServerConfig) -> mcp::Result<Transport> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if config.transport == TransportKind::Http {
            return Transport::connect(config, Path::new("/"), |_| None).await;
        }
        let Some(tools) = self.servers.get(&config.name) else {
            return Err(mcp::Error::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such program",
            )));
        };
        let transport = fake_server(&config.name, tools.clone());
        transport.initialize().await?;
        Ok(transport)
    }
}
