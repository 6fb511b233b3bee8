//! Opening transports for configured servers.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use mcp::{ServerConfig, Transport};

type SecretLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Opens a handshaken [`Transport`] for a server configuration.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ServerConfig)
    -> impl Future<Output = mcp::Result<Transport>> + Send;
}

/// Spawns stdio servers as child processes and reaches HTTP servers over
/// the network.
#[derive(Clone)]
pub struct ProcessConnector {
    install_dir: PathBuf,
    secrets: SecretLookup,
}

impl ProcessConnector {
    /// Resolve paths against the running executable's directory and secrets
    /// from the process environment.
    pub fn new() -> Self {
        let install_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            install_dir,
            secrets: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// Root relative path arguments at `dir`.
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = dir.into();
        self
    }

    /// Resolve empty environment values through `lookup`.
    pub fn with_secret_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.secrets = Arc::new(lookup);
        self
    }

    pub fn install_dir(&self) -> &std::path::Path {
        &self.install_dir
    }
}

impl Default for ProcessConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessConnector")
            .field("install_dir", &self.install_dir)
            .finish_non_exhaustive()
    }
}

impl Connector for ProcessConnector {
    async fn connect(&self, config: &ServerConfig) -> mcp::Result<Transport> {
        let secrets = &self.secrets;
        Transport::connect(config, &self.install_dir, |key| secrets(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let connector = ProcessConnector::new()
            .with_install_dir("/opt/skillchat")
            .with_secret_lookup(|key| (key == "TOKEN").then(|| "t".to_string()));

        assert_eq!(connector.install_dir(), std::path::Path::new("/opt/skillchat"));
        assert_eq!((connector.secrets)("TOKEN").as_deref(), Some("t"));
        assert_eq!((connector.secrets)("OTHER"), None);
    }

    #[tokio::test]
    async fn http_without_endpoint_is_configuration_error() {
        let connector = ProcessConnector::new();
        let err = connector
            .connect(&ServerConfig::http("remote", ""))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), mcp::ErrorKind::Configuration);
    }
}
