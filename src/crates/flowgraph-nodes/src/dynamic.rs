//! Dynamic nodes: commands and agents resolved from the run state
//!
//! The static node kinds fix their parameters at workflow build time; the
//! dynamic kinds defer to resolver closures evaluated against the current
//! state at execution time. A dynamic command can build its shell string
//! (or argv) from PR numbers and branch names written by earlier nodes; a
//! dynamic agent can pick model, prompt and capabilities the same way.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use flowgraph_core::{
    EngineContext, EngineError, NodeKind, NodeOutcome, NodeRuntime, Result, StateDelta, Transition,
    WorkflowState,
};

use crate::command::{run_command, CommandSpec, DEFAULT_COMMAND_TIMEOUT};
use crate::provider::{AgentProvider, AgentRequest};
use crate::result::{keys, AgentResult, CommandResult};

/// Builds a command from the post-merge state of the preceding nodes.
pub type CommandResolver =
    Arc<dyn Fn(&WorkflowState) -> std::result::Result<CommandSpec, String> + Send + Sync>;

/// Subprocess node whose command is computed from state
pub struct DynamicCommandNode {
    name: String,
    resolver: CommandResolver,
    cwd: Option<PathBuf>,
    env: HashMap<String, String>,
    timeout: Duration,
    throw_on_error: bool,
    result_key: String,
    then: Transition,
}

impl DynamicCommandNode {
    pub fn new<F>(name: impl Into<String>, then: Transition, resolver: F) -> Self
    where
        F: Fn(&WorkflowState) -> std::result::Result<CommandSpec, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            resolver: Arc::new(resolver),
            cwd: None,
            env: HashMap::new(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            throw_on_error: true,
            result_key: keys::LAST_DYNAMIC_COMMAND_RESULT.to_string(),
            then,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
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
}

#[async_trait]
impl NodeRuntime for DynamicCommandNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::DynamicCommand
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(EngineError::config(format!(
                "dynamic command node '{}' has a zero timeout",
                self.name
            )));
        }
        Ok(())
    }

    async fn execute(&self, state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        let spec = (self.resolver)(state).map_err(|e| {
            EngineError::node_execution(&self.name, NodeKind::DynamicCommand, e)
        })?;
        tracing::debug!(node = %self.name, command = %spec.display(), "resolved dynamic command");

        let result = match run_command(&spec, self.cwd.as_ref(), &self.env, self.timeout).await {
            Ok(result) => result,
            Err(err @ EngineError::Timeout { .. }) if !self.throw_on_error => CommandResult {
                success: false,
                stdout: String::new(),
                stderr: String::new(),
                exit_code: None,
                duration_ms: self.timeout.as_millis() as u64,
                error: Some(err.to_string()),
            },
            Err(err) => return Err(err),
        };

        if !result.success && self.throw_on_error {
            return Err(EngineError::node_execution(
                &self.name,
                NodeKind::DynamicCommand,
                format!(
                    "command failed ({}): {}",
                    result.error.as_deref().unwrap_or("unknown"),
                    result.stderr
                ),
            ));
        }

        let delta =
            StateDelta::context_value(self.result_key.clone(), serde_json::to_value(&result)?);
        Ok(NodeOutcome::from_delta(delta))
    }
}

type Resolver<T> = Arc<dyn Fn(&WorkflowState) -> T + Send + Sync>;

/// Agent node whose parameters are computed from state
///
/// Only the prompt resolver is mandatory; the rest fall back to neutral
/// defaults when unset.
pub struct DynamicAgentNode {
    name: String,
    provider: Arc<dyn AgentProvider>,
    prompt: Resolver<String>,
    system: Option<Resolver<String>>,
    role: String,
    model: Option<Resolver<Option<String>>>,
    capabilities: Option<Resolver<Vec<String>>>,
    max_turns: Option<Resolver<Option<u32>>>,
    temperature: Option<Resolver<Option<f32>>>,
    throw_on_error: bool,
    result_key: String,
    then: Transition,
}

impl DynamicAgentNode {
    pub fn new<F>(
        name: impl Into<String>,
        then: Transition,
        provider: Arc<dyn AgentProvider>,
        prompt: F,
    ) -> Self
    where
        F: Fn(&WorkflowState) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            provider,
            prompt: Arc::new(prompt),
            system: None,
            role: "assistant".to_string(),
            model: None,
            capabilities: None,
            max_turns: None,
            temperature: None,
            throw_on_error: true,
            result_key: keys::LAST_AGENT_RESULT.to_string(),
            then,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_system<F>(mut self, system: F) -> Self
    where
        F: Fn(&WorkflowState) -> String + Send + Sync + 'static,
    {
        self.system = Some(Arc::new(system));
        self
    }

    pub fn with_model<F>(mut self, model: F) -> Self
    where
        F: Fn(&WorkflowState) -> Option<String> + Send + Sync + 'static,
    {
        self.model = Some(Arc::new(model));
        self
    }

    pub fn with_capabilities<F>(mut self, capabilities: F) -> Self
    where
        F: Fn(&WorkflowState) -> Vec<String> + Send + Sync + 'static,
    {
        self.capabilities = Some(Arc::new(capabilities));
        self
    }

    pub fn with_max_turns<F>(mut self, max_turns: F) -> Self
    where
        F: Fn(&WorkflowState) -> Option<u32> + Send + Sync + 'static,
    {
        self.max_turns = Some(Arc::new(max_turns));
        self
    }

    pub fn with_temperature<F>(mut self, temperature: F) -> Self
    where
        F: Fn(&WorkflowState) -> Option<f32> + Send + Sync + 'static,
    {
        self.temperature = Some(Arc::new(temperature));
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
}

#[async_trait]
impl NodeRuntime for DynamicAgentNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::DynamicAgent
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    async fn execute(&self, state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        let request = AgentRequest {
            role: self.role.clone(),
            system_prompt: self.system.as_ref().map(|f| f(state)).unwrap_or_default(),
            user_prompt: (self.prompt)(state),
            capabilities: self
                .capabilities
                .as_ref()
                .map(|f| f(state))
                .unwrap_or_default(),
            model: self.model.as_ref().and_then(|f| f(state)),
            max_turns: self.max_turns.as_ref().and_then(|f| f(state)),
            temperature: self.temperature.as_ref().and_then(|f| f(state)),
        };

        let started = Instant::now();
        let response = self.provider.run(&request).await?;
        let result = AgentResult {
            success: response.success,
            output: response.output,
            error: response.error,
            usage: response.usage,
            files_affected: response.files_affected,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if !result.success && self.throw_on_error {
            return Err(EngineError::node_execution(
                &self.name,
                NodeKind::DynamicAgent,
                result.error.clone().unwrap_or_else(|| "agent failed".into()),
            ));
        }

        let delta =
            StateDelta::context_value(self.result_key.clone(), serde_json::to_value(&result)?);
        Ok(NodeOutcome::from_delta(delta))
    }
}
