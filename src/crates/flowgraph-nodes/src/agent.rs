//! Agent nodes: provider-backed sessions with tool use
//!
//! An agent node hands a role, system prompt, interpolated user prompt and
//! capability list to an [`AgentProvider`] and records the structured
//! response. Retrying is the engine's job, not the node's. When
//! `output_key` is set the agent's output is additionally stored there -
//! parsed as JSON when `parse_output_json` is on - which is how analysis
//! and planning steps publish their results for downstream nodes.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use flowgraph_core::{
    EngineContext, EngineError, NodeKind, NodeOutcome, NodeRuntime, Result, StateDelta, Transition,
    WorkflowState,
};

use crate::interpolate::interpolate;
use crate::provider::{parse_json_output, AgentProvider, AgentRequest};
use crate::result::{keys, AgentResult};

/// Provider-backed agent node
pub struct AgentNode {
    name: String,
    role: String,
    system_prompt: String,
    prompt: String,
    capabilities: Vec<String>,
    model: Option<String>,
    max_turns: Option<u32>,
    temperature: Option<f32>,
    provider: Arc<dyn AgentProvider>,
    throw_on_error: bool,
    result_key: String,
    output_key: Option<String>,
    parse_output_json: bool,
    then: Transition,
}

impl AgentNode {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        system_prompt: impl Into<String>,
        prompt: impl Into<String>,
        provider: Arc<dyn AgentProvider>,
        then: Transition,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
            capabilities: Vec::new(),
            model: None,
            max_turns: None,
            temperature: None,
            provider,
            throw_on_error: true,
            result_key: keys::LAST_AGENT_RESULT.to_string(),
            output_key: None,
            parse_output_json: false,
            then,
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
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

    /// Additionally publish the agent output under `key`.
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Parse the output as JSON before publishing under the output key.
    pub fn with_json_output(mut self) -> Self {
        self.parse_output_json = true;
        self
    }
}

#[async_trait]
impl NodeRuntime for AgentNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Agent
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    fn validate(&self) -> Result<()> {
        if self.role.trim().is_empty() {
            return Err(EngineError::config(format!(
                "agent node '{}' has an empty role",
                self.name
            )));
        }
        if self.prompt.trim().is_empty() {
            return Err(EngineError::config(format!(
                "agent node '{}' has an empty prompt",
                self.name
            )));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=1.0).contains(&t) {
                return Err(EngineError::config(format!(
                    "agent node '{}' temperature {} outside [0, 1]",
                    self.name, t
                )));
            }
        }
        if self.max_turns == Some(0) {
            return Err(EngineError::config(format!(
                "agent node '{}' max_turns must be positive",
                self.name
            )));
        }
        Ok(())
    }

    async fn execute(&self, state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        let request = AgentRequest {
            role: self.role.clone(),
            system_prompt: interpolate(&self.system_prompt, &state.context),
            user_prompt: interpolate(&self.prompt, &state.context),
            capabilities: self.capabilities.clone(),
            model: self.model.clone(),
            max_turns: self.max_turns,
            temperature: self.temperature,
        };

        let started = Instant::now();
        let response = self.provider.run(&request).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = AgentResult {
            success: response.success,
            output: response.output,
            error: response.error,
            usage: response.usage,
            files_affected: response.files_affected,
            duration_ms,
        };

        if !result.success && self.throw_on_error {
            return Err(EngineError::node_execution(
                &self.name,
                NodeKind::Agent,
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "agent session failed".into()),
            ));
        }

        let mut delta =
            StateDelta::context_value(self.result_key.clone(), serde_json::to_value(&result)?);
        if let Some(output_key) = &self.output_key {
            let published: Value = if self.parse_output_json {
                match parse_json_output(&result.output) {
                    Some(value) => value,
                    None if self.throw_on_error => {
                        return Err(EngineError::node_execution(
                            &self.name,
                            NodeKind::Agent,
                            "agent output is not valid JSON",
                        ));
                    }
                    None => Value::String(result.output.clone()),
                }
            } else {
                Value::String(result.output.clone())
            };
            delta.context.insert(output_key.clone(), published);
        }
        Ok(NodeOutcome::from_delta(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::AgentResponse;
    use serde_json::json;

    struct CannedAgent {
        output: String,
        success: bool,
    }

    #[async_trait]
    impl AgentProvider for CannedAgent {
        async fn run(&self, _request: &AgentRequest) -> Result<AgentResponse> {
            Ok(AgentResponse {
                success: self.success,
                output: self.output.clone(),
                error: (!self.success).then(|| "model refused".to_string()),
                usage: None,
                files_affected: vec![],
            })
        }
    }

    fn ctx() -> EngineContext {
        EngineContext::new("test-run")
    }

    #[tokio::test]
    async fn test_agent_publishes_json_output() {
        let node = AgentNode::new(
            "PLAN",
            "planner",
            "You plan work.",
            "Plan issue {{issueNumber}}",
            Arc::new(CannedAgent {
                output: r#"{"tasks": [{"id": "t1"}]}"#.into(),
                success: true,
            }),
            Transition::end(),
        )
        .with_output_key("tasks")
        .with_json_output();

        let mut state = WorkflowState::new("PLAN");
        state.context.insert("issueNumber".into(), json!(7));

        let outcome = node.execute(&state, &ctx()).await.unwrap();
        assert_eq!(outcome.delta.context["tasks"]["tasks"][0]["id"], json!("t1"));
        assert_eq!(
            outcome.delta.context[keys::LAST_AGENT_RESULT]["success"],
            json!(true)
        );
    }

    #[tokio::test]
    async fn test_agent_failure_throws_by_default() {
        let node = AgentNode::new(
            "ANALYZE",
            "analyst",
            "sys",
            "prompt",
            Arc::new(CannedAgent {
                output: String::new(),
                success: false,
            }),
            Transition::end(),
        );
        let err = node
            .execute(&WorkflowState::new("ANALYZE"), &ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model refused"));
    }

    #[test]
    fn test_validation_temperature_range() {
        let node = AgentNode::new(
            "A",
            "r",
            "s",
            "p",
            Arc::new(CannedAgent {
                output: String::new(),
                success: true,
            }),
            Transition::end(),
        )
        .with_temperature(1.5);
        assert!(node.validate().is_err());
    }
}
