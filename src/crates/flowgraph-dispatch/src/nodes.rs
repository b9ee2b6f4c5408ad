//! Dispatch-flavored workflow nodes
//!
//! Packaged node runtimes over the resolver and tracker seams, so
//! workflows can run dispatch and status mutations as ordinary graph
//! steps: [`DispatchNode`] computes the plan into context,
//! [`MatrixEmitNode`] writes the artifacts, [`ProjectStatusNode`] moves
//! an issue's board status, [`CommentNode`] posts an issue comment.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};

use flowgraph_core::{
    EngineContext, EngineError, NodeKind, NodeOutcome, NodeRuntime, Result, StateDelta, Transition,
    WorkflowState,
};
use flowgraph_nodes::interpolate;
use flowgraph_nodes::result::keys;

use crate::matrix::emit_matrix;
use crate::resolve::DispatchResolver;
use crate::tracker::{IssueClient, ProjectClient};
use crate::types::DispatchMatrix;

/// Context keys written by the dispatch nodes.
pub mod dispatch_keys {
    pub const MATRIX: &str = "dispatchMatrix";
    pub const CYCLES: &str = "dispatchCycles";
    pub const BLOCKED: &str = "blockedIssues";
    pub const TOTAL_FETCHED: &str = "dispatchTotalFetched";
}

/// Runs the full dependency resolution and stores the plan in context.
pub struct DispatchNode {
    name: String,
    resolver: Arc<DispatchResolver>,
    then: Transition,
}

impl DispatchNode {
    pub fn new(name: impl Into<String>, resolver: Arc<DispatchResolver>, then: Transition) -> Self {
        Self {
            name: name.into(),
            resolver,
            then,
        }
    }
}

#[async_trait]
impl NodeRuntime for DispatchNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Dispatch
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    async fn execute(&self, _state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        let outcome = self.resolver.run().await.map_err(|e| {
            EngineError::node_execution(&self.name, NodeKind::Dispatch, e.to_string())
        })?;

        let delta = StateDelta::new()
            .with_context(dispatch_keys::MATRIX, serde_json::to_value(&outcome.matrix)?)
            .with_context(dispatch_keys::CYCLES, serde_json::to_value(&outcome.cycles)?)
            .with_context(dispatch_keys::BLOCKED, json!(outcome.blocked_ids))
            .with_context(dispatch_keys::TOTAL_FETCHED, json!(outcome.total_fetched));
        Ok(NodeOutcome::from_delta(delta))
    }
}

/// Writes the matrix from context to the output file / Actions output.
pub struct MatrixEmitNode {
    name: String,
    output_file: Option<std::path::PathBuf>,
    dry_run: bool,
    then: Transition,
}

impl MatrixEmitNode {
    pub fn new(
        name: impl Into<String>,
        output_file: Option<std::path::PathBuf>,
        dry_run: bool,
        then: Transition,
    ) -> Self {
        Self {
            name: name.into(),
            output_file,
            dry_run,
            then,
        }
    }
}

#[async_trait]
impl NodeRuntime for MatrixEmitNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Dispatch
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    async fn execute(&self, state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        let matrix: DispatchMatrix = state
            .get(dispatch_keys::MATRIX)
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();

        emit_matrix(&matrix, self.output_file.as_deref(), self.dry_run).map_err(|e| {
            EngineError::node_execution(&self.name, NodeKind::Dispatch, e.to_string())
        })?;
        Ok(NodeOutcome::empty())
    }
}

/// Moves an issue's project status; failure is recorded, not thrown, by
/// default (status syncs are best-effort).
pub struct ProjectStatusNode {
    name: String,
    project: Arc<dyn ProjectClient>,
    status: String,
    throw_on_error: bool,
    result_key: String,
    then: Transition,
}

impl ProjectStatusNode {
    pub fn new(
        name: impl Into<String>,
        project: Arc<dyn ProjectClient>,
        status: impl Into<String>,
        then: Transition,
    ) -> Self {
        Self {
            name: name.into(),
            project,
            status: status.into(),
            throw_on_error: false,
            result_key: keys::LAST_PROJECT_RESULT.to_string(),
            then,
        }
    }

    pub fn with_throw_on_error(mut self, throw: bool) -> Self {
        self.throw_on_error = throw;
        self
    }
}

#[async_trait]
impl NodeRuntime for ProjectStatusNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::ProjectStatus
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    async fn execute(&self, state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        let repository = state
            .get_str("repository")
            .ok_or_else(|| EngineError::config("context key 'repository' missing"))?;
        let (owner, repo) = repository
            .split_once('/')
            .ok_or_else(|| EngineError::config("'repository' must be owner/repo"))?;
        let issue_number = state
            .get_i64("issueNumber")
            .ok_or_else(|| EngineError::config("context key 'issueNumber' missing"))?
            as u64;

        let started = Instant::now();
        let result = match self
            .project
            .update_status(owner, repo, issue_number, &self.status)
            .await
        {
            Ok(()) => json!({
                "success": true,
                "status": self.status,
                "durationMs": started.elapsed().as_millis() as u64,
            }),
            Err(e) => {
                if self.throw_on_error {
                    return Err(EngineError::node_execution(
                        &self.name,
                        NodeKind::ProjectStatus,
                        e.to_string(),
                    ));
                }
                tracing::warn!(node = %self.name, error = %e, "status update failed, recording");
                json!({
                    "success": false,
                    "status": self.status,
                    "error": e.to_string(),
                    "durationMs": started.elapsed().as_millis() as u64,
                })
            }
        };

        let success = result["success"] == json!(true);
        let mut delta = StateDelta::context_value(self.result_key.clone(), result);
        if success {
            delta
                .context
                .insert("doneStatus".into(), Value::String(self.status.clone()));
        }
        Ok(NodeOutcome::from_delta(delta))
    }
}

/// Posts a comment on the context's issue.
pub struct CommentNode {
    name: String,
    issues: Arc<dyn IssueClient>,
    body_template: String,
    throw_on_error: bool,
    result_key: String,
    then: Transition,
}

impl CommentNode {
    pub fn new(
        name: impl Into<String>,
        issues: Arc<dyn IssueClient>,
        body_template: impl Into<String>,
        then: Transition,
    ) -> Self {
        Self {
            name: name.into(),
            issues,
            body_template: body_template.into(),
            throw_on_error: true,
            result_key: keys::LAST_COMMENT_RESULT.to_string(),
            then,
        }
    }

    pub fn with_throw_on_error(mut self, throw: bool) -> Self {
        self.throw_on_error = throw;
        self
    }
}

#[async_trait]
impl NodeRuntime for CommentNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Comment
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    async fn execute(&self, state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        let repository = state
            .get_str("repository")
            .ok_or_else(|| EngineError::config("context key 'repository' missing"))?;
        let (owner, repo) = repository
            .split_once('/')
            .ok_or_else(|| EngineError::config("'repository' must be owner/repo"))?;
        let issue_number = state
            .get_i64("issueNumber")
            .ok_or_else(|| EngineError::config("context key 'issueNumber' missing"))?
            as u64;

        let body = interpolate(&self.body_template, &state.context);
        let started = Instant::now();
        let result = match self
            .issues
            .post_comment(owner, repo, issue_number, &body)
            .await
        {
            Ok(()) => json!({
                "success": true,
                "durationMs": started.elapsed().as_millis() as u64,
            }),
            Err(e) => {
                if self.throw_on_error {
                    return Err(EngineError::node_execution(
                        &self.name,
                        NodeKind::Comment,
                        e.to_string(),
                    ));
                }
                json!({
                    "success": false,
                    "error": e.to_string(),
                    "durationMs": started.elapsed().as_millis() as u64,
                })
            }
        };

        Ok(NodeOutcome::from_delta(StateDelta::context_value(
            self.result_key.clone(),
            result,
        )))
    }
}
