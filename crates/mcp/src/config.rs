//! Server configuration.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

/// File suffixes that mark an argument as a path to an executable or library.
const PATH_SUFFIXES: &[&str] = &[".dll", ".exe", ".so", ".dylib", ".jar"];

/// How the client talks to a server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Spawn a child process and speak over its stdin/stdout.
    #[default]
    Stdio,
    /// POST JSON-RPC messages to a remote endpoint.
    Http,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Configuration for an MCP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment overrides. An empty value asks the host to supply it.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub endpoint: String,
}

fn default_enabled() -> bool {
    true
}

impl ServerConfig {
    /// Configuration for a server spawned as a child process.
    pub fn stdio(
        name: impl Into<String>,
        command: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            transport: TransportKind::Stdio,
            enabled: true,
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            endpoint: String::new(),
        }
    }

    /// Configuration for a server reached over HTTP.
    pub fn http(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportKind::Http,
            enabled: true,
            command: String::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Add an environment override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Mark the server as disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Arguments with relative file paths rooted at `base_dir`.
    pub fn resolved_args(&self, base_dir: &Path) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| resolve_arg(arg, base_dir))
            .collect()
    }

    /// Environment overrides with empty values filled in by `lookup`.
    ///
    /// Entries that stay unresolved are left out of the result.
    pub fn resolved_env<F>(&self, lookup: F) -> BTreeMap<String, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.env
            .iter()
            .filter_map(|(key, value)| {
                if value.is_empty() {
                    let resolved = lookup(key);
                    if resolved.is_none() {
                        tracing::warn!(server = %self.name, var = %key, "no value for environment variable");
                    }
                    resolved.map(|v| (key.clone(), v))
                } else {
                    Some((key.clone(), value.clone()))
                }
            })
            .collect()
    }
}

/// Rewrite `arg` to an absolute path under `base_dir` if it looks like a
/// relative file path.
///
/// Package identifiers (`@scope/pkg`) and flags (`-x`, `--flag`) are never
/// touched.
pub fn resolve_arg(arg: &str, base_dir: &Path) -> String {
    if arg.starts_with('@') || arg.starts_with('-') {
        return arg.to_string();
    }

    let looks_like_path =
        arg.contains("..") || PATH_SUFFIXES.iter().any(|suffix| arg.ends_with(suffix));
    if !looks_like_path || Path::new(arg).is_absolute() {
        return arg.to_string();
    }

    normalize(&base_dir.join(arg)).to_string_lossy().into_owned()
}

/// Lexically collapse `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_names_and_flags_untouched() {
        let base = Path::new("/opt/app");
        assert_eq!(
            resolve_arg("@modelcontextprotocol/server-github", base),
            "@modelcontextprotocol/server-github"
        );
        assert_eq!(resolve_arg("--root=../data", base), "--root=../data");
        assert_eq!(resolve_arg("-y", base), "-y");
    }

    #[test]
    fn relative_paths_are_rooted() {
        let base = Path::new("/opt/app/bin");
        assert_eq!(resolve_arg("../servers/fs.dll", base), "/opt/app/servers/fs.dll");
        assert_eq!(resolve_arg("tools/server.exe", base), "/opt/app/bin/tools/server.exe");
        assert_eq!(resolve_arg("../data", base), "/opt/app/data");
    }

    #[test]
    fn plain_args_and_absolute_paths_untouched() {
        let base = Path::new("/opt/app");
        assert_eq!(resolve_arg("serve", base), "serve");
        assert_eq!(resolve_arg("/usr/lib/server.so", base), "/usr/lib/server.so");
        assert_eq!(resolve_arg("server.py", base), "server.py");
    }

    #[test]
    fn empty_env_values_use_lookup() {
        let config = ServerConfig::stdio("github", "npx", ["-y"])
            .with_env("GITHUB_TOKEN", "")
            .with_env("LOG_LEVEL", "debug")
            .with_env("MISSING", "");

        let env = config.resolved_env(|key| (key == "GITHUB_TOKEN").then(|| "secret".to_string()));

        assert_eq!(env.get("GITHUB_TOKEN").map(String::as_str), Some("secret"));
        assert_eq!(env.get("LOG_LEVEL").map(String::as_str), Some("debug"));
        assert!(!env.contains_key("MISSING"));
    }

    #[test]
    fn deserialize_defaults() {
        let config: ServerConfig = serde_json::from_value(serde_json::json!({
            "name": "fs",
            "command": "mcp-fs",
        }))
        .unwrap();
        assert_eq!(config.transport, TransportKind::Stdio);
        assert!(config.enabled);
        assert!(config.args.is_empty());

        let http: ServerConfig = serde_json::from_value(serde_json::json!({
            "name": "remote",
            "transport": "http",
            "endpoint": "https://example.com/mcp",
            "enabled": false,
        }))
        .unwrap();
        assert_eq!(http.transport, TransportKind::Http);
        assert!(!http.enabled);
    }
}
