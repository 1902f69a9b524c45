//! OpenAI-compatible chat-completion provider.
//!
//! Supports OpenAI, Ollama, vLLM, LM Studio, and any
//! endpoint that follows the OpenAI chat completions API format.

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::ServiceError;
use crate::types::{
    CompletionRequest, CompletionResponse, Content, Message, Role, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Returns true when `base_url` points at a server on this machine.
pub(crate) fn is_local_url(base_url: Option<&str>) -> bool {
    base_url
        .map(|u| u.contains("localhost") || u.contains("127.0.0.1"))
        .unwrap_or(false)
}

/// Resolve the bearer token: inline key, then the named env var, then a
/// dummy token for local servers that do not check it.
pub(crate) fn resolve_api_key(
    inline: Option<&str>,
    api_key_env: &str,
    base_url: Option<&str>,
) -> Result<String, ServiceError> {
    inline
        .map(str::to_string)
        .or_else(|| std::env::var(api_key_env).ok())
        .or_else(|| {
            if is_local_url(base_url) {
                debug!("No API key set for local provider; using dummy bearer token");
                Some("local".to_string())
            } else {
                None
            }
        })
        .ok_or_else(|| ServiceError::AuthFailed {
            provider: format!("OpenAI-compatible: env var '{api_key_env}' not set"),
        })
}

/// Build the shared HTTP client with a per-request timeout.
pub(crate) fn http_client(timeout_secs: u64) -> Result<Client, ServiceError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ServiceError::Connection {
            message: format!("Failed to build HTTP client: {e}"),
        })
}

/// Map a reqwest transport error, surfacing timeouts distinctly.
pub(crate) fn map_send_error(err: reqwest::Error, timeout_secs: u64) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout { timeout_secs }
    } else if err.is_connect() {
        ServiceError::Connection {
            message: err.to_string(),
        }
    } else {
        ServiceError::ApiRequest {
            message: format!("Request failed: {err}"),
        }
    }
}

/// Map an HTTP status code to the appropriate ServiceError.
pub(crate) fn map_http_error(status: reqwest::StatusCode, body: &str) -> ServiceError {
    match status.as_u16() {
        401 => {
            debug!(body = %body, "Authentication failed (401)");
            ServiceError::AuthFailed {
                provider: "OpenAI-compatible".to_string(),
            }
        }
        429 => {
            // "Rate limit reached ... try again in 20s"
            let retry_secs = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| {
                    v.get("error")?
                        .get("message")?
                        .as_str()
                        .map(|s| s.to_string())
                })
                .and_then(|msg| {
                    msg.split("in ")
                        .last()
                        .and_then(|s| s.trim_end_matches('s').parse::<u64>().ok())
                })
                .unwrap_or(5);
            ServiceError::RateLimited {
                retry_after_secs: retry_secs,
            }
        }
        status if status >= 500 => ServiceError::ApiRequest {
            message: format!("Server error ({status}): {body}"),
        },
        _ => ServiceError::ApiRequest {
            message: format!("HTTP {status}: {body}"),
        },
    }
}

/// OpenAI-compatible chat provider.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider from configuration.
    ///
    /// Reads the API key from the environment variable specified in `config.api_key_env`.
    pub fn new(config: &LlmConfig) -> Result<Self, ServiceError> {
        let api_key = resolve_api_key(
            config.api_key.as_deref(),
            &config.api_key_env,
            config.base_url.as_deref(),
        )?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, ServiceError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            client: http_client(config.request_timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// Convert internal messages to OpenAI JSON format.
    fn messages_to_json(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| match &msg.content {
                Content::Text { text } => json!({
                    "role": msg.role.to_string(),
                    "content": text,
                }),
                Content::ToolCall {
                    id,
                    name,
                    arguments,
                } => json!({
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [Self::tool_call_json(id, name, arguments)],
                }),
                Content::MultiPart { parts } => {
                    let mut text_parts = Vec::new();
                    let mut tool_calls = Vec::new();
                    for part in parts {
                        match part {
                            Content::Text { text } => text_parts.push(text.clone()),
                            Content::ToolCall {
                                id,
                                name,
                                arguments,
                            } => tool_calls.push(Self::tool_call_json(id, name, arguments)),
                            Content::MultiPart { .. } => {}
                        }
                    }
                    if tool_calls.is_empty() {
                        json!({
                            "role": msg.role.to_string(),
                            "content": text_parts.join("\n"),
                        })
                    } else {
                        json!({
                            "role": "assistant",
                            "content": if text_parts.is_empty() { Value::Null } else { Value::String(text_parts.join("\n")) },
                            "tool_calls": tool_calls,
                        })
                    }
                }
            })
            .collect()
    }

    fn tool_call_json(id: &str, name: &str, arguments: &Value) -> Value {
        let arguments = match arguments {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        };
        json!({
            "id": id,
            "type": "function",
            "function": { "name": name, "arguments": arguments }
        })
    }

    /// Convert tool definitions to OpenAI format.
    fn tools_to_json(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    /// Assemble the chat completions request body.
    fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "messages": Self::messages_to_json(&request.messages),
            "stream": false,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(tools) = &request.tools
            && !tools.is_empty()
        {
            body["tools"] = json!(Self::tools_to_json(tools));
            if let Some(name) = &request.tool_choice {
                body["tool_choice"] = json!({
                    "type": "function",
                    "function": { "name": name }
                });
            }
        }
        body
    }

    /// Parse an OpenAI-format response body into a CompletionResponse.
    ///
    /// Function-call arguments that are not valid JSON are kept verbatim as a
    /// string so the caller can report the encoding problem.
    fn parse_response(body: &Value, model: &str) -> Result<CompletionResponse, ServiceError> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| ServiceError::ResponseParse {
                message: "No choices in response".to_string(),
            })?;

        let message = choice
            .get("message")
            .ok_or_else(|| ServiceError::ResponseParse {
                message: "No message in choice".to_string(),
            })?;

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|f| f.as_str())
            .map(|s| s.to_string());

        let text = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or("");

        let mut calls: Vec<Content> = message
            .get("tool_calls")
            .and_then(|t| t.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|tc| {
                        let id = tc.get("id")?.as_str()?.to_string();
                        let func = tc.get("function")?;
                        let name = func.get("name")?.as_str()?.to_string();
                        let arguments = match func.get("arguments")? {
                            Value::String(raw) => serde_json::from_str(raw)
                                .unwrap_or_else(|_| Value::String(raw.clone())),
                            other => other.clone(),
                        };
                        Some(Content::ToolCall {
                            id,
                            name,
                            arguments,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let content = match calls.len() {
            0 => Content::text(text),
            1 if text.is_empty() => calls.remove(0),
            _ => {
                let mut parts = Vec::new();
                if !text.is_empty() {
                    parts.push(Content::text(text));
                }
                parts.extend(calls);
                Content::MultiPart { parts }
            }
        };

        let usage_obj = body.get("usage");
        let usage = TokenUsage {
            input_tokens: usage_obj
                .and_then(|u| u.get("prompt_tokens"))
                .and_then(|t| t.as_u64())
                .unwrap_or(0) as usize,
            output_tokens: usage_obj
                .and_then(|u| u.get("completion_tokens"))
                .and_then(|t| t.as_u64())
                .unwrap_or(0) as usize,
        };

        let resp_model = body
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(model)
            .to_string();

        Ok(CompletionResponse {
            message: Message::new(Role::Assistant, content),
            usage,
            model: resp_model,
            finish_reason,
        })
    }

    /// List the model ids the endpoint serves (`GET {base}/models`).
    pub async fn list_models(&self) -> Result<Vec<String>, ServiceError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ServiceError::ApiRequest {
            message: format!("Failed to read response body: {e}"),
        })?;
        if !status.is_success() {
            return Err(map_http_error(status, &body));
        }
        let json: Value = serde_json::from_str(&body).map_err(|e| ServiceError::ResponseParse {
            message: format!("Invalid JSON: {e}"),
        })?;
        Ok(Self::parse_model_list(&json))
    }

    fn parse_model_list(body: &Value) -> Vec<String> {
        let mut ids: Vec<String> = body
            .get("data")
            .and_then(|d| d.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m.get("id")?.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(&request);

        debug!(url = %url, model = %body["model"], "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| ServiceError::ApiRequest {
            message: format!("Failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(map_http_error(status, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| ServiceError::ResponseParse {
                message: format!("Invalid JSON: {e}"),
            })?;

        Self::parse_response(&json, &self.model)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
