//! Slash-command nodes
//!
//! Delegates `/<command> <args>` to a [`SlashCommandRunner`] - an
//! interactive session runtime that tracks affected files through
//! tool-call introspection. Args are interpolated against the context
//! before dispatch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::timeout;

use flowgraph_core::{
    EngineContext, EngineError, NodeKind, NodeOutcome, NodeRuntime, Result, StateDelta, Transition,
    WorkflowState,
};

use crate::interpolate::interpolate;
use crate::provider::SlashCommandRunner;
use crate::result::{keys, AgentResult};

/// Default slash-command timeout: 600 seconds.
pub const DEFAULT_SLASH_TIMEOUT: Duration = Duration::from_secs(600);

/// Slash-command node
pub struct SlashCommandNode {
    name: String,
    command_name: String,
    args: String,
    runner: Arc<dyn SlashCommandRunner>,
    timeout: Duration,
    throw_on_error: bool,
    result_key: String,
    then: Transition,
}

impl SlashCommandNode {
    pub fn new(
        name: impl Into<String>,
        command_name: impl Into<String>,
        args: impl Into<String>,
        runner: Arc<dyn SlashCommandRunner>,
        then: Transition,
    ) -> Self {
        Self {
            name: name.into(),
            command_name: command_name.into(),
            args: args.into(),
            runner,
            timeout: DEFAULT_SLASH_TIMEOUT,
            throw_on_error: true,
            result_key: keys::LAST_SLASH_COMMAND_RESULT.to_string(),
            then,
        }
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
impl NodeRuntime for SlashCommandNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::SlashCommand
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    fn validate(&self) -> Result<()> {
        if self.command_name.trim().is_empty() {
            return Err(EngineError::config(format!(
                "slash-command node '{}' has an empty command name",
                self.name
            )));
        }
        Ok(())
    }

    async fn execute(&self, state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        let args = interpolate(&self.args, &state.context);
        tracing::debug!(node = %self.name, command = %self.command_name, "running slash command");

        let started = Instant::now();
        let response = match timeout(self.timeout, self.runner.run(&self.command_name, &args)).await
        {
            Ok(response) => response?,
            Err(_) => {
                return Err(EngineError::timeout(
                    format!("/{} {}", self.command_name, args),
                    self.timeout.as_millis() as u64,
                ))
            }
        };
        let result = AgentResult {
            success: response.success,
            output: response.output,
            error: response.error,
            usage: None,
            files_affected: response.files_affected,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if !result.success && self.throw_on_error {
            return Err(EngineError::node_execution(
                &self.name,
                NodeKind::SlashCommand,
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("/{} failed", self.command_name)),
            ));
        }

        let delta =
            StateDelta::context_value(self.result_key.clone(), serde_json::to_value(&result)?);
        Ok(NodeOutcome::from_delta(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SlashCommandResponse;
    use serde_json::json;

    struct RecordingRunner;

    #[async_trait]
    impl SlashCommandRunner for RecordingRunner {
        async fn run(&self, command_name: &str, args: &str) -> Result<SlashCommandResponse> {
            Ok(SlashCommandResponse {
                success: true,
                output: format!("/{command_name} {args}"),
                error: None,
                files_affected: vec!["src/lib.rs".into()],
            })
        }
    }

    #[tokio::test]
    async fn test_slash_command_interpolates_args() {
        let node = SlashCommandNode::new(
            "REVIEW",
            "review",
            "--pr {{prNumber}}",
            Arc::new(RecordingRunner),
            Transition::end(),
        );
        let mut state = WorkflowState::new("REVIEW");
        state.context.insert("prNumber".into(), json!(12));

        let outcome = node
            .execute(&state, &EngineContext::new("run"))
            .await
            .unwrap();
        let result = &outcome.delta.context[keys::LAST_SLASH_COMMAND_RESULT];
        assert_eq!(result["output"], json!("/review --pr 12"));
        assert_eq!(result["filesAffected"], json!(["src/lib.rs"]));
    }
}
