//! Google Gemini generateContent client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use flowgraph_core::{EngineError, Result};

use crate::provider::{
    parse_json_output, LlmProvider, LlmRequest, LlmResponse, OutputMode, ProviderTag, Usage,
};

use super::DEFAULT_LLM_TIMEOUT;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini client
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_base: String,
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self::with_api_base(API_BASE)
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_LLM_TIMEOUT)
            .build()
            .expect("reqwest client with static configuration");
        Self {
            client,
            api_base: api_base.into(),
        }
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: u64,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: u64,
}

/// Translate a generateContent response into the common response shape.
/// Parts of the first candidate concatenate into `raw_output`.
fn convert_response(parsed: GenerateResponse, output_mode: OutputMode) -> LlmResponse {
    let raw_output: String = parsed
        .candidates
        .first()
        .map(|c| {
            c.content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        })
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
        usage: parsed.usage_metadata.map(|u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        }),
        error: None,
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Gemini
    }

    async fn execute(&self, request: &LlmRequest, api_key: &str) -> Result<LlmResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.api_base, request.model
        );

        let mut body = json!({
            "contents": [{"parts": [{"text": request.user_prompt}]}],
        });
        if let Some(system) = &request.system_prompt {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        let mut generation_config = json!({});
        if let Some(temperature) = request.temperature {
            generation_config["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }
        if request.output_mode == OutputMode::Json {
            generation_config["responseMimeType"] = json!("application/json");
        }
        if generation_config.as_object().map(|o| !o.is_empty()).unwrap_or(false) {
            body["generationConfig"] = generation_config;
        }

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::provider(format!("gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Ok(LlmResponse::failure(format!(
                "gemini: HTTP {status}: {text}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| EngineError::provider(format!("gemini response parse failed: {e}")))?;

        Ok(convert_response(parsed, request.output_mode))
    }
}
