//! LLM nodes: one-shot completions through the provider registry

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use flowgraph_core::{
    EngineContext, EngineError, NodeKind, NodeOutcome, NodeRuntime, Result, StateDelta, Transition,
    WorkflowState,
};

use crate::interpolate::interpolate;
use crate::provider::{LlmRequest, OutputMode, ProviderRegistry};
use crate::result::{keys, LlmResult};

/// Single-completion node dispatched by model id
///
/// The registry picks the provider from the model prefix; the API key is
/// read from the provider's conventional environment variable unless
/// overridden with [`with_api_key_env`](Self::with_api_key_env).
pub struct LlmNode {
    name: String,
    model: String,
    system_prompt: Option<String>,
    prompt: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    output_mode: OutputMode,
    registry: Arc<ProviderRegistry>,
    api_key_env: Option<String>,
    throw_on_error: bool,
    result_key: String,
    output_key: Option<String>,
    then: Transition,
}

impl LlmNode {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        registry: Arc<ProviderRegistry>,
        then: Transition,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            system_prompt: None,
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
            output_mode: OutputMode::Text,
            registry,
            api_key_env: None,
            throw_on_error: true,
            result_key: keys::LAST_LLM_RESULT.to_string(),
            output_key: None,
            then,
        }
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    pub fn with_throw_on_error(mut self, throw: bool) -> Self {
        self.throw_on_error = throw;
        self
    }

    pub fn with_result_key(mut self, key: impl Into<String>) -> Self {
        self.result_key = key.into();
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }
}

#[async_trait]
impl NodeRuntime for LlmNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Llm
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(EngineError::config(format!(
                "llm node '{}' has an empty model",
                self.name
            )));
        }
        if self.prompt.trim().is_empty() {
            return Err(EngineError::config(format!(
                "llm node '{}' has an empty prompt",
                self.name
            )));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=1.0).contains(&t) {
                return Err(EngineError::config(format!(
                    "llm node '{}' temperature {} outside [0, 1]",
                    self.name, t
                )));
            }
        }
        Ok(())
    }

    async fn execute(&self, state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        let provider = self.registry.provider_for_model(&self.model)?;
        let api_key_env = self
            .api_key_env
            .clone()
            .unwrap_or_else(|| provider.tag().api_key_env().to_string());
        let api_key = std::env::var(&api_key_env).map_err(|_| {
            EngineError::provider(format!("environment variable {api_key_env} is not set"))
        })?;

        let request = LlmRequest {
            model: self.model.clone(),
            system_prompt: self
                .system_prompt
                .as_ref()
                .map(|s| interpolate(s, &state.context)),
            user_prompt: interpolate(&self.prompt, &state.context),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            reasoning_effort: None,
            enable_web_search: false,
            output_mode: self.output_mode,
        };

        let started = Instant::now();
        let response = provider.execute(&request, &api_key).await?;
        let result = LlmResult {
            success: response.success,
            raw_output: response.raw_output,
            output: response.output,
            thinking: response.thinking,
            usage: response.usage,
            error: response.error,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if !result.success && self.throw_on_error {
            return Err(EngineError::node_execution(
                &self.name,
                NodeKind::Llm,
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "completion failed".into()),
            ));
        }

        let mut delta =
            StateDelta::context_value(self.result_key.clone(), serde_json::to_value(&result)?);
        if let Some(output_key) = &self.output_key {
            let value = result
                .output
                .clone()
                .unwrap_or_else(|| serde_json::Value::String(result.raw_output.clone()));
            delta.context.insert(output_key.clone(), value);
        }
        Ok(NodeOutcome::from_delta(delta))
    }
}
