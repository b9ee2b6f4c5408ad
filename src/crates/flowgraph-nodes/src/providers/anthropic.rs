//! Anthropic Messages API client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use flowgraph_core::{EngineError, Result};

use crate::provider::{
    parse_json_output, LlmProvider, LlmRequest, LlmResponse, OutputMode, ProviderTag, Usage,
};

use super::DEFAULT_LLM_TIMEOUT;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic Messages API client
#[derive(Clone)]
pub struct AnthropicProvider {
    client: Client,
    api_url: String,
}

impl AnthropicProvider {
    pub fn new() -> Self {
        Self::with_api_url(API_URL)
    }

    /// Point the client at a different endpoint (proxies, tests).
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_LLM_TIMEOUT)
            .build()
            .expect("reqwest client with static configuration");
        Self {
            client,
            api_url: api_url.into(),
        }
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Build the failure response for an API-level error.
fn api_failure(message: impl Into<String>) -> LlmResponse {
    LlmResponse::failure(format!("anthropic: {}", message.into()))
}

/// Translate a Messages API response into the common response shape.
///
/// Text blocks concatenate into `raw_output`; the first thinking block is
/// surfaced separately; JSON mode attempts to parse the text output.
fn convert_response(parsed: MessagesResponse, output_mode: OutputMode) -> LlmResponse {
    let raw_output: String = parsed
        .content
        .iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    let thinking = parsed
        .content
        .iter()
        .filter(|block| block.block_type == "thinking")
        .filter_map(|block| block.thinking.clone())
        .next();

    let output = match output_mode {
        OutputMode::Json => parse_json_output(&raw_output),
        OutputMode::Text => None,
    };

    LlmResponse {
        success: true,
        raw_output,
        output,
        thinking,
        usage: parsed.usage.map(|u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        }),
        error: None,
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Anthropic
    }

    async fn execute(&self, request: &LlmRequest, api_key: &str) -> Result<LlmResponse> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: vec![Message {
                role: "user",
                content: &request.user_prompt,
            }],
            system: request.system_prompt.as_deref(),
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::provider(format!("anthropic request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ApiError>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Ok(api_failure(message));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| EngineError::provider(format!("anthropic response parse failed: {e}")))?;

        Ok(convert_response(parsed, request.output_mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let provider = AnthropicProvider::new();
        assert_eq!(provider.tag(), ProviderTag::Anthropic);
        assert_eq!(provider.api_url, API_URL);

        let proxied = AnthropicProvider::with_api_url("http://localhost:9000/v1/messages");
        assert_eq!(proxied.api_url, "http://localhost:9000/v1/messages");
    }

    #[test]
    fn test_response_conversion() {
        let parsed: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "weighing options"},
                {"type": "text", "text": "Hello"},
                {"type": "text", "text": " world"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 4}
        }))
        .unwrap();

        let response = convert_response(parsed, OutputMode::Text);
        assert!(response.success);
        assert_eq!(response.raw_output, "Hello world");
        assert_eq!(response.thinking.as_deref(), Some("weighing options"));
        assert!(response.output.is_none());

        let usage = response.usage.unwrap();
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.output_tokens, 4);
    }

    #[test]
    fn test_json_mode_parses_fenced_output() {
        let parsed: MessagesResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "```json\n{\"tasks\": []}\n```"}]
        }))
        .unwrap();

        let response = convert_response(parsed, OutputMode::Json);
        assert_eq!(response.output, Some(json!({"tasks": []})));
    }

    #[test]
    fn test_error_body_mapping() {
        let parsed: ApiError = serde_json::from_value(json!({
            "error": {"type": "invalid_request_error", "message": "max_tokens required"}
        }))
        .unwrap();

        let response = api_failure(parsed.error.message);
        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("anthropic: max_tokens required")
        );
    }
}
