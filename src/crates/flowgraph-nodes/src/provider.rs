//! Provider seams consumed by the agent, LLM and slash-command nodes
//!
//! The engine core never talks to a model vendor directly. Nodes delegate
//! to these traits and translate the structured responses into result
//! records. Multi-provider dispatch goes through [`ProviderRegistry`],
//! which maps model-id prefixes to provider tags.
//!
//! Concrete `reqwest` clients live in [`crate::providers`]; tests inject
//! stubs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use flowgraph_core::{EngineError, Result};

/// How an LLM response should be shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Text,
    Json,
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub reasoning_effort: Option<String>,
    pub enable_web_search: bool,
    pub output_mode: OutputMode,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            user_prompt: user_prompt.into(),
            temperature: None,
            max_tokens: None,
            reasoning_effort: None,
            enable_web_search: false,
            output_mode: OutputMode::Text,
        }
    }
}

/// Structured completion response.
///
/// `success=false` responses carry `error` and are either recorded or
/// thrown depending on the node's `throw_on_error`.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub success: bool,
    pub raw_output: String,
    pub output: Option<Value>,
    pub thinking: Option<String>,
    pub usage: Option<Usage>,
    pub error: Option<String>,
}

impl LlmResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            raw_output: String::new(),
            output: None,
            thinking: None,
            usage: None,
            error: Some(error.into()),
        }
    }
}

/// One LLM vendor integration.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Which vendor this client talks to.
    fn tag(&self) -> ProviderTag;

    /// Execute a completion. Transport failures are `Err`; model-level
    /// failures come back as `success=false` responses.
    async fn execute(&self, request: &LlmRequest, api_key: &str) -> Result<LlmResponse>;
}

/// Vendor tags used for model routing and API-key lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderTag {
    Anthropic,
    OpenAi,
    Gemini,
}

impl ProviderTag {
    /// Environment variable conventionally holding this vendor's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderTag::Anthropic => "ANTHROPIC_API_KEY",
            ProviderTag::OpenAi => "OPENAI_API_KEY",
            ProviderTag::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderTag::Anthropic => f.write_str("anthropic"),
            ProviderTag::OpenAi => f.write_str("openai"),
            ProviderTag::Gemini => f.write_str("gemini"),
        }
    }
}

/// Model-id to provider dispatch
///
/// Prefix rules route a model id to a registered provider; the default
/// rules cover the three supported vendors (`claude-*` to Anthropic,
/// `gpt-*`/`o1`/`o3`/`o4` to OpenAI, `gemini-*` to Gemini).
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderTag, Arc<dyn LlmProvider>>,
    prefixes: Vec<(String, ProviderTag)>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default().with_default_prefixes()
    }

    fn with_default_prefixes(mut self) -> Self {
        for (prefix, tag) in [
            ("claude", ProviderTag::Anthropic),
            ("gpt", ProviderTag::OpenAi),
            ("o1", ProviderTag::OpenAi),
            ("o3", ProviderTag::OpenAi),
            ("o4", ProviderTag::OpenAi),
            ("gemini", ProviderTag::Gemini),
        ] {
            self.prefixes.push((prefix.to_string(), tag));
        }
        self
    }

    /// Register (or replace) the client for a vendor.
    pub fn register(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(provider.tag(), provider);
        self
    }

    /// Add a custom model-prefix routing rule. Later rules win on ties.
    pub fn map_model(mut self, prefix: impl Into<String>, tag: ProviderTag) -> Self {
        self.prefixes.push((prefix.into(), tag));
        self
    }

    /// Which vendor serves `model`, by longest matching prefix.
    pub fn tag_for_model(&self, model: &str) -> Option<ProviderTag> {
        self.prefixes
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, tag)| *tag)
    }

    /// Resolve the client for `model`.
    pub fn provider_for_model(&self, model: &str) -> Result<Arc<dyn LlmProvider>> {
        let tag = self
            .tag_for_model(model)
            .ok_or_else(|| EngineError::provider(format!("no provider mapped for model '{model}'")))?;
        self.providers
            .get(&tag)
            .cloned()
            .ok_or_else(|| EngineError::provider(format!("provider '{tag}' is not registered")))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("prefixes", &self.prefixes)
            .finish()
    }
}

/// Agent-SDK request: a role-scoped session with tool-use iterations.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub role: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub capabilities: Vec<String>,
    pub model: Option<String>,
    pub max_turns: Option<u32>,
    pub temperature: Option<f32>,
}

/// Agent-SDK response with tool-call introspection.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub usage: Option<Usage>,
    /// File paths the session touched, tracked via tool-call introspection.
    pub files_affected: Vec<String>,
}

/// Agent SDK seam.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    async fn run(&self, request: &AgentRequest) -> Result<AgentResponse>;
}

/// Slash-command runtime response.
#[derive(Debug, Clone)]
pub struct SlashCommandResponse {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub files_affected: Vec<String>,
}

/// Runtime that turns `/<cmd> <args>` into an interactive session.
#[async_trait]
pub trait SlashCommandRunner: Send + Sync {
    async fn run(&self, command_name: &str, args: &str) -> Result<SlashCommandResponse>;
}

/// Best-effort extraction of a JSON value from model text output.
///
/// Tolerates markdown code fences around the payload; returns `None` when
/// nothing parses.
pub fn parse_json_output(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))?
        .strip_suffix("```")?
        .trim();
    serde_json::from_str(unfenced).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NullProvider(ProviderTag);

    #[async_trait]
    impl LlmProvider for NullProvider {
        fn tag(&self) -> ProviderTag {
            self.0
        }
        async fn execute(&self, _request: &LlmRequest, _api_key: &str) -> Result<LlmResponse> {
            Ok(LlmResponse::failure("null provider"))
        }
    }

    #[test]
    fn test_default_model_routing() {
        let registry = ProviderRegistry::new();
        assert_eq!(
            registry.tag_for_model("claude-sonnet-4-20250514"),
            Some(ProviderTag::Anthropic)
        );
        assert_eq!(registry.tag_for_model("gpt-4o"), Some(ProviderTag::OpenAi));
        assert_eq!(registry.tag_for_model("o3-mini"), Some(ProviderTag::OpenAi));
        assert_eq!(
            registry.tag_for_model("gemini-1.5-pro"),
            Some(ProviderTag::Gemini)
        );
        assert_eq!(registry.tag_for_model("llama-3"), None);
    }

    #[test]
    fn test_unregistered_provider_is_an_error() {
        let registry = ProviderRegistry::new();
        assert!(registry.provider_for_model("claude-3").is_err());

        let registry = registry.register(Arc::new(NullProvider(ProviderTag::Anthropic)));
        assert!(registry.provider_for_model("claude-3").is_ok());
        assert!(registry.provider_for_model("gpt-4").is_err());
    }

    #[test]
    fn test_custom_prefix_wins_when_longer() {
        let registry = ProviderRegistry::new().map_model("gpt-custom", ProviderTag::Gemini);
        assert_eq!(
            registry.tag_for_model("gpt-custom-1"),
            Some(ProviderTag::Gemini)
        );
        assert_eq!(registry.tag_for_model("gpt-4"), Some(ProviderTag::OpenAi));
    }

    #[test]
    fn test_parse_json_output() {
        assert_eq!(parse_json_output(r#"{"a": 1}"#), Some(json!({"a": 1})));
        assert_eq!(
            parse_json_output("```json\n{\"a\": 1}\n```"),
            Some(json!({"a": 1}))
        );
        assert_eq!(
            parse_json_output("```\n[1, 2]\n```"),
            Some(json!([1, 2]))
        );
        assert_eq!(parse_json_output("not json"), None);
    }

    #[test]
    fn test_api_key_env_names() {
        assert_eq!(ProviderTag::Anthropic.api_key_env(), "ANTHROPIC_API_KEY");
        assert_eq!(ProviderTag::OpenAi.api_key_env(), "OPENAI_API_KEY");
        assert_eq!(ProviderTag::Gemini.api_key_env(), "GEMINI_API_KEY");
    }
}
