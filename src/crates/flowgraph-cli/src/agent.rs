//! Single-completion agent bridge
//!
//! When no interactive agent SDK is wired in, agent steps degrade to one
//! LLM completion through the provider registry: the role and system
//! prompt become the system message, the step prompt the user message.
//! No tool use, so `files_affected` stays empty.

use std::sync::Arc;

use async_trait::async_trait;

use flowgraph_core::{EngineError, Result};
use flowgraph_nodes::provider::{
    AgentProvider, AgentRequest, AgentResponse, LlmRequest, OutputMode, ProviderRegistry,
};

pub struct LlmAgentProvider {
    registry: Arc<ProviderRegistry>,
    default_model: String,
}

impl LlmAgentProvider {
    pub fn new(registry: Arc<ProviderRegistry>, default_model: impl Into<String>) -> Self {
        Self {
            registry,
            default_model: default_model.into(),
        }
    }
}

#[async_trait]
impl AgentProvider for LlmAgentProvider {
    async fn run(&self, request: &AgentRequest) -> Result<AgentResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let provider = self.registry.provider_for_model(&model)?;
        let api_key_env = provider.tag().api_key_env();
        let api_key = std::env::var(api_key_env).map_err(|_| {
            EngineError::provider(format!("environment variable {api_key_env} is not set"))
        })?;

        let llm_request = LlmRequest {
            model,
            system_prompt: Some(format!(
                "Role: {}\n\n{}",
                request.role, request.system_prompt
            )),
            user_prompt: request.user_prompt.clone(),
            temperature: request.temperature,
            max_tokens: None,
            reasoning_effort: None,
            enable_web_search: false,
            output_mode: OutputMode::Text,
        };

        let response = provider.execute(&llm_request, &api_key).await?;
        Ok(AgentResponse {
            success: response.success,
            output: response.raw_output,
            error: response.error,
            usage: response.usage,
            files_affected: Vec::new(),
        })
    }
}
