//! Configuration loading from skillchat.toml.

use std::collections::BTreeMap;
use std::path::Path;

use mcp::ServerConfig;
use runtime::{DEFAULT_MAX_TOOL_ROUNDS, GenerationParams, OpenAiEndpoint, Skill};
use serde::Deserialize;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "skillchat.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Model provider configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Skill used to seed the system prompt.
    pub skill: Option<Skill>,

    /// Headless run settings.
    #[serde(default)]
    pub run: RunConfig,

    /// Values for server env entries left empty.
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,

    /// Tool servers, in registration order.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Azure,
}

impl Provider {
    /// Environment variable consulted when no key is configured.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Azure => "AZURE_OPENAI_API_KEY",
        }
    }
}

/// Backend provider configuration.
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub provider: Provider,

    /// Model name, or deployment name for Azure.
    #[serde(default = "default_model")]
    pub model: String,

    pub api_key: Option<String>,

    /// Azure resource endpoint, or an OpenAI-compatible base URL.
    pub endpoint: Option<String>,

    /// Azure API version.
    pub api_version: Option<String>,

    #[serde(flatten)]
    pub params: GenerationParams,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: default_model(),
            api_key: None,
            endpoint: None,
            api_version: None,
            params: GenerationParams::default(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Used when no skill is configured.
    pub system_prompt: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            system_prompt: None,
        }
    }
}

fn default_max_tool_rounds() -> usize {
    DEFAULT_MAX_TOOL_ROUNDS
}

#[derive(Debug, Default, Deserialize)]
pub struct RunConfig {
    pub user_input: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolve the provider endpoint, reading the API key from `env` when
    /// the file does not set one.
    pub fn endpoint<F>(&self, env: F) -> Result<OpenAiEndpoint, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = &self.backend;
        let var = backend.provider.api_key_var();
        let api_key = backend
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| env(var))
            .ok_or(ConfigError::MissingApiKey { var })?;

        let endpoint = match backend.provider {
            Provider::OpenAi => {
                let endpoint = OpenAiEndpoint::openai(api_key);
                match &backend.endpoint {
                    Some(url) if !url.is_empty() => endpoint.with_base_url(url),
                    _ => endpoint,
                }
            }
            Provider::Azure => {
                let url = backend
                    .endpoint
                    .clone()
                    .filter(|u| !u.is_empty())
                    .ok_or(ConfigError::MissingEndpoint)?;
                let endpoint = OpenAiEndpoint::azure(url, api_key);
                match &backend.api_version {
                    Some(version) => endpoint.with_api_version(version),
                    None => endpoint,
                }
            }
        };
        Ok(endpoint)
    }

    /// System prompt: the skill's if present, else `session.system_prompt`.
    pub fn system_prompt(&self) -> Option<String> {
        match &self.skill {
            Some(skill) => Some(skill.system_prompt()),
            None => self.session.system_prompt.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("API key not configured: set backend.api_key or {var}")]
    MissingApiKey { var: &'static str },

    #[error("azure backend requires backend.endpoint")]
    MissingEndpoint,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp::TransportKind;

    const FULL: &str = r#"
        [backend]
        provider = "azure"
        model = "gpt-4o-deploy"
        endpoint = "https://res.openai.azure.com"
        api_version = "2024-06-01"
        max_tokens = 1024
        temperature = 0.2

        [session]
        max_tool_rounds = 5
        system_prompt = "ignored because of the skill"

        [skill]
        name = "pdf"
        description = "Work with PDFs."
        instructions = "Use the scripts."
        resources = [{ kind = "script", path = "scripts/extract.py" }]

        [run]
        user_input = "summarize report.pdf"

        [secrets]
        GITHUB_TOKEN = "ghp_test"

        [[servers]]
        name = "filesystem"
        command = "npx"
        args = ["-y", "@modelcontextprotocol/server-filesystem", "../data"]
        env = { GITHUB_TOKEN = "" }

        [[servers]]
        name = "remote"
        transport = "http"
        endpoint = "https://example.com/mcp"
        enabled = false
    "#;

    #[test]
    fn parse_full_config() {
        let config = Config::parse(FULL).unwrap();

        assert_eq!(config.backend.provider, Provider::Azure);
        assert_eq!(config.backend.params.max_tokens, 1024);
        assert!((config.backend.params.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.session.max_tool_rounds, 5);
        assert_eq!(config.run.user_input.as_deref(), Some("summarize report.pdf"));
        assert_eq!(config.secrets.get("GITHUB_TOKEN").map(String::as_str), Some("ghp_test"));

        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].transport, TransportKind::Stdio);
        assert_eq!(config.servers[0].env.get("GITHUB_TOKEN").map(String::as_str), Some(""));
        assert_eq!(config.servers[1].transport, TransportKind::Http);
        assert!(!config.servers[1].enabled);

        let prompt = config.system_prompt().unwrap();
        assert!(prompt.starts_with("# pdf\n"));
        assert!(prompt.contains("- script: scripts/extract.py"));
    }

    #[test]
    fn defaults_for_empty_file() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.backend.provider, Provider::OpenAi);
        assert_eq!(config.backend.model, "gpt-4o");
        assert_eq!(config.backend.params, GenerationParams::default());
        assert_eq!(config.session.max_tool_rounds, DEFAULT_MAX_TOOL_ROUNDS);
        assert!(config.servers.is_empty());
        assert!(config.system_prompt().is_none());
    }

    #[test]
    fn session_prompt_used_without_skill() {
        let config = Config::parse("[session]\nsystem_prompt = \"Be brief.\"\n").unwrap();
        assert_eq!(config.system_prompt().as_deref(), Some("Be brief."));

        let with_skill = Config::parse(FULL).unwrap();
        assert_ne!(
            with_skill.system_prompt().as_deref(),
            with_skill.session.system_prompt.as_deref()
        );
    }

    #[test]
    fn api_key_falls_back_to_env() {
        let config = Config::parse(FULL).unwrap();
        let endpoint = config
            .endpoint(|var| (var == "AZURE_OPENAI_API_KEY").then(|| "from-env".to_string()))
            .unwrap();
        assert!(matches!(
            endpoint,
            OpenAiEndpoint::Azure { ref api_key, ref api_version, .. }
                if api_key == "from-env" && api_version == "2024-06-01"
        ));

        let err = config.endpoint(|_| None).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingApiKey {
                var: "AZURE_OPENAI_API_KEY"
            }
        ));
    }

    #[test]
    fn azure_requires_endpoint() {
        let config = Config::parse("[backend]\nprovider = \"azure\"\napi_key = \"k\"\n").unwrap();
        assert!(matches!(
            config.endpoint(|_| None),
            Err(ConfigError::MissingEndpoint)
        ));
    }

    #[test]
    fn configured_key_wins_over_env() {
        let config = Config::parse("[backend]\napi_key = \"sk-file\"\n").unwrap();
        let endpoint = config.endpoint(|_| Some("sk-env".to_string())).unwrap();
        assert!(matches!(
            endpoint,
            OpenAiEndpoint::OpenAi { ref api_key, .. } if api_key == "sk-file"
        ));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        assert!(matches!(
            Config::parse("[backend\nprovider = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
