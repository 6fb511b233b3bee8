//! OpenAI-compatible chat completions backend (OpenAI and Azure OpenAI).

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::{
    Completion, CompletionClient, CompletionError, CompletionRequest, FinishReason, Message,
    ToolCall, ToolSpec, Usage,
};
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

/// Where requests go and how they authenticate.
#[derive(Debug, Clone)]
pub enum OpenAiEndpoint {
    /// api.openai.com or any compatible server, bearer token auth.
    OpenAi { api_key: String, base_url: String },
    /// An Azure OpenAI resource, `api-key` header auth. The model name is
    /// the deployment name.
    Azure {
        endpoint: String,
        api_key: String,
        api_version: String,
    },
}

impl OpenAiEndpoint {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::OpenAi {
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn azure(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::Azure {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
        }
    }

    /// Override the base URL (OpenAI) or API version (Azure).
    pub fn with_base_url(self, url: impl Into<String>) -> Self {
        match self {
            Self::OpenAi { api_key, .. } => Self::OpenAi {
                api_key,
                base_url: url.into(),
            },
            azure => azure,
        }
    }

    pub fn with_api_version(self, version: impl Into<String>) -> Self {
        match self {
            Self::Azure {
                endpoint, api_key, ..
            } => Self::Azure {
                endpoint,
                api_key,
                api_version: version.into(),
            },
            openai => openai,
        }
    }

    fn api_key(&self) -> &str {
        match self {
            Self::OpenAi { api_key, .. } | Self::Azure { api_key, .. } => api_key,
        }
    }

    fn url(&self, model: &str) -> String {
        match self {
            Self::OpenAi { base_url, .. } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
            Self::Azure {
                endpoint,
                api_version,
                ..
            } => format!(
                "{}/openai/deployments/{model}/chat/completions?api-version={api_version}",
                endpoint.trim_end_matches('/'),
            ),
        }
    }

    fn apply_headers(&self, req: RequestBuilder) -> RequestBuilder {
        match self {
            Self::OpenAi { api_key, .. } => req.bearer_auth(api_key),
            Self::Azure { api_key, .. } => req.header("api-key", api_key),
        }
    }
}

impl std::fmt::Display for OpenAiEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi { .. } => write!(f, "openai"),
            Self::Azure { .. } => write!(f, "azure"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: ApiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ApiFunction<'a>,
}

#[derive(Debug, Serialize)]
struct ApiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    /// Compatible servers often send an explicit `null` here.
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiBackendBuilder {
    endpoint: OpenAiEndpoint,
    model: String,
}

impl OpenAiBackendBuilder {
    pub fn new(endpoint: OpenAiEndpoint, model: impl Into<String>) -> Self {
        Self {
            endpoint,
            model: model.into(),
        }
    }

    /// Validate settings and create the backend.
    pub fn build(self) -> Result<OpenAiBackend> {
        if self.model.trim().is_empty() {
            return Err(Error::Config("model must not be empty".into()));
        }
        if self.endpoint.api_key().trim().is_empty() {
            return Err(Error::Config(format!(
                "missing API key for {} backend",
                self.endpoint
            )));
        }
        if let OpenAiEndpoint::Azure { endpoint, .. } = &self.endpoint {
            if endpoint.trim().is_empty() {
                return Err(Error::Config("azure backend requires an endpoint".into()));
            }
        }

        Ok(OpenAiBackend {
            client: reqwest::Client::new(),
            url: self.endpoint.url(&self.model),
            endpoint: self.endpoint,
            model: self.model,
        })
    }
}

/// OpenAI-compatible chat completions backend.
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: OpenAiEndpoint,
    model: String,
    url: String,
}

impl OpenAiBackend {
    pub fn builder(endpoint: OpenAiEndpoint, model: impl Into<String>) -> OpenAiBackendBuilder {
        OpenAiBackendBuilder::new(endpoint, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn message_to_api(msg: &Message) -> ApiMessage {
        match msg {
            Message::System { content } => ApiMessage::text("system", content),
            Message::User { content } => ApiMessage::text("user", content),
            Message::Assistant {
                content,
                tool_calls,
            } => ApiMessage {
                role: "assistant",
                content: content.clone(),
                tool_calls: tool_calls
                    .iter()
                    .map(|call| ApiToolCall {
                        id: call.id.clone(),
                        call_type: function_type(),
                        function: ApiFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    })
                    .collect(),
                tool_call_id: None,
            },
            Message::Tool { call_id, content } => ApiMessage {
                role: "tool",
                content: Some(content.clone()),
                tool_calls: Vec::new(),
                tool_call_id: Some(call_id.clone()),
            },
        }
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiTool<'_> {
        ApiTool {
            tool_type: "function",
            function: ApiFunction {
                name: &spec.name,
                description: &spec.description,
                parameters: &spec.parameters,
            },
        }
    }

    fn build_request<'a>(&'a self, request: &CompletionRequest<'a>) -> ApiRequest<'a> {
        // Azure routes by deployment in the URL.
        let model = match self.endpoint {
            OpenAiEndpoint::OpenAi { .. } => Some(self.model.as_str()),
            OpenAiEndpoint::Azure { .. } => None,
        };

        ApiRequest {
            model,
            messages: request.messages.iter().map(Self::message_to_api).collect(),
            tools: request.tools.iter().map(Self::tool_to_api).collect(),
            max_tokens: request.params.max_tokens,
            temperature: request.params.temperature,
        }
    }

    fn parse_response(response: ApiResponse) -> std::result::Result<Completion, CompletionError> {
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::InvalidResponse("no choices in response".into()))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall::new(call.id, call.function.name, call.function.arguments))
            .collect();

        let finish_reason = match choice.finish_reason.as_deref() {
            Some(reason) => FinishReason::parse(reason),
            None if !tool_calls.is_empty() => FinishReason::ToolCalls,
            None => FinishReason::Stop,
        };

        Ok(Completion {
            text: choice.message.content.filter(|t| !t.is_empty()),
            tool_calls,
            finish_reason,
            usage,
        })
    }
}

impl ApiMessage {
    fn text(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

impl std::fmt::Display for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.endpoint, self.model)
    }
}

impl CompletionClient for OpenAiBackend {
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> std::result::Result<Completion, CompletionError> {
        let api_request = self.build_request(&request);

        let req = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header("accept", "application/json");

        let req = self.endpoint.apply_headers(req);

        let response = req
            .json(&api_request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        Self::parse_response(api_response)
    }
}
