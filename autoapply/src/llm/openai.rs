//! OpenAI-compatible chat-completions client with function calling.
//!
//! Works against the official endpoint or any compatible proxy via the
//! base-URL override. No streaming: the agent loop consumes complete
//! turns.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{CompletionOptions, ToolCallingClient};
use crate::error::LlmError;
use crate::message::{ChatMessage, LlmToolResponse, ToolCall};
use crate::tool::ToolDefinition;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default model identifier.
const DEFAULT_MODEL: &str = "gpt-4o";

/// Chat-completions client.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: Arc<str>,
    base_url: Arc<str>,
    model: Arc<str>,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl OpenAiClient {
    /// Client with the default endpoint, model and timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::builder().api_key(api_key).build()
    }

    /// Start a builder.
    #[must_use]
    pub fn builder() -> OpenAiClientBuilder {
        OpenAiClientBuilder::default()
    }

    /// Base URL in use.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_body(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: CompletionOptions,
    ) -> Value {
        let mut body = json!({
            "model": &*self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(
                tools
                    .iter()
                    .map(ToolDefinition::to_openai_format)
                    .collect(),
            );
            body["tool_choice"] = Value::String("auto".into());
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    fn parse_response(data: &Value) -> Result<LlmToolResponse, LlmError> {
        let choice = data["choices"]
            .get(0)
            .ok_or_else(|| LlmError::Protocol("no choices in response".into()))?;
        let message = &choice["message"];
        let text = message["content"].as_str().map(str::to_owned);
        let finish_reason = choice["finish_reason"].as_str().map(str::to_owned);

        let mut tool_calls = Vec::new();
        if let Some(raw_calls) = message["tool_calls"].as_array() {
            for raw in raw_calls {
                let name = raw["function"]["name"]
                    .as_str()
                    .ok_or_else(|| LlmError::Protocol("tool call without a name".into()))?
                    .to_owned();
                let arguments = parse_arguments(&raw["function"]["arguments"], &name)?;
                tool_calls.push(ToolCall { name, arguments });
            }
        }

        Ok(LlmToolResponse {
            tool_calls,
            text,
            finish_reason,
        })
    }
}

/// Arguments arrive as a JSON-encoded string; some proxies inline the
/// object. Anything else is a protocol violation.
fn parse_arguments(raw: &Value, tool: &str) -> Result<Map<String, Value>, LlmError> {
    match raw {
        Value::String(s) if s.trim().is_empty() => Ok(Map::new()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(LlmError::Protocol(format!(
                "tool call '{tool}': arguments are not an object"
            ))),
            Err(e) => Err(LlmError::Protocol(format!(
                "tool call '{tool}': malformed arguments: {e}"
            ))),
        },
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        _ => Err(LlmError::Protocol(format!(
            "tool call '{tool}': arguments are not an object"
        ))),
    }
}

#[async_trait]
impl ToolCallingClient for OpenAiClient {
    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: CompletionOptions,
    ) -> Result<LlmToolResponse, LlmError> {
        let body = self.build_body(messages, tools, options);
        debug!(model = %self.model, messages = messages.len(), "LLM request");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&*self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let data: Value = response.json().await?;
        Self::parse_response(&data)
    }
}

/// Builder for [`OpenAiClient`].
#[derive(Debug, Default)]
pub struct OpenAiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
}

impl OpenAiClientBuilder {
    /// Set the API key (required).
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the base URL (for proxies and compatible servers).
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Override the model id.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<OpenAiClient, LlmError> {
        let api_key = self
            .api_key
            .ok_or_else(|| LlmError::Protocol("api key is required".into()))?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| "https://api.openai.com/v1".to_owned());
        let base_url = base_url.trim_end_matches('/').to_owned();
        let http = reqwest::Client::builder()
            .timeout(
                self.timeout
                    .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            )
            .build()?;
        Ok(OpenAiClient {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: self
                .model
                .unwrap_or_else(|| DEFAULT_MODEL.to_owned())
                .into(),
        })
    }
}
