//! OpenAI chat-completions client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use flowgraph_core::{EngineError, Result};

use crate::provider::{
    parse_json_output, LlmProvider, LlmRequest, LlmResponse, OutputMode, ProviderTag, Usage,
};

use super::DEFAULT_LLM_TIMEOUT;

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI chat-completions client
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_url: String,
}

impl OpenAiProvider {
    pub fn new() -> Self {
        Self::with_api_url(API_URL)
    }

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

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Translate a chat-completions response into the common response shape.
fn convert_response(parsed: ChatResponse, output_mode: OutputMode) -> LlmResponse {
    let raw_output = parsed
        .choices
        .first()
        .and_then(|c| c.message.content.clone())
        .unwrap_or_default();
    let output = match output_mode {
        OutputMode::Json => parse_json_output(&raw_output),
        OutputMode::Text => None,
    };

    LlmResponse {
        success: true,
        raw_output,
        output,
        thinking: None,
        usage: parsed.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
        error: None,
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::OpenAi
    }

    async fn execute(&self, request: &LlmRequest, api_key: &str) -> Result<LlmResponse> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.user_prompt,
        });

        let mut body = json!({
            "model": request.model,
            "messages": messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(effort) = &request.reasoning_effort {
            body["reasoning_effort"] = json!(effort);
        }
        if request.output_mode == OutputMode::Json {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::provider(format!("openai request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Ok(LlmResponse::failure(format!(
                "openai: HTTP {status}: {text}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EngineError::provider(format!("openai response parse failed: {e}")))?;

        Ok(convert_response(parsed, request.output_mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let provider = OpenAiProvider::new();
        assert_eq!(provider.tag(), ProviderTag::OpenAi);
        assert_eq!(provider.api_url, API_URL);

        let proxied = OpenAiProvider::with_api_url("http://localhost:9000/v1/chat/completions");
        assert_eq!(proxied.api_url, "http://localhost:9000/v1/chat/completions");
    }

    #[test]
    fn test_response_conversion() {
        let parsed: ChatResponse = serde_json::from_value(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "first choice"}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ],
            "usage": {"prompt_tokens": 21, "completion_tokens": 7, "total_tokens": 28}
        }))
        .unwrap();

        let response = convert_response(parsed, OutputMode::Text);
        assert!(response.success);
        assert_eq!(response.raw_output, "first choice");
        assert!(response.output.is_none());

        let usage = response.usage.unwrap();
        assert_eq!(usage.input_tokens, 21);
        assert_eq!(usage.output_tokens, 7);
    }

    #[test]
    fn test_empty_choices_yield_empty_output() {
        let parsed: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        let response = convert_response(parsed, OutputMode::Text);
        assert!(response.success);
        assert_eq!(response.raw_output, "");
        assert!(response.usage.is_none());
    }

    #[test]
    fn test_json_mode_parses_output() {
        let parsed: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"ready\": true}"}}]
        }))
        .unwrap();

        let response = convert_response(parsed, OutputMode::Json);
        assert_eq!(response.output, Some(json!({"ready": true})));
    }
}
