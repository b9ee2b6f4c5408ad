//! Eval nodes: pure synchronous context transforms
//!
//! An eval is the only node kind allowed to produce a delta without any
//! suspension point: no I/O, no awaits, just a function from the current
//! state to a partial context. The engine merges the returned map and the
//! node records `{success, updatedKeys, duration}` under its result key.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};

use flowgraph_core::{
    EngineContext, EngineError, NodeKind, NodeOutcome, NodeRuntime, Result, StateDelta, Transition,
    WorkflowState,
};

use crate::result::{keys, EvalReport};

/// Transform signature: post-state in, partial context out.
pub type EvalFn =
    Arc<dyn Fn(&WorkflowState) -> std::result::Result<Map<String, Value>, String> + Send + Sync>;

/// Pure context-transform node
pub struct EvalNode {
    name: String,
    transform: EvalFn,
    result_key: String,
    then: Transition,
}

impl EvalNode {
    pub fn new<F>(name: impl Into<String>, then: Transition, transform: F) -> Self
    where
        F: Fn(&WorkflowState) -> std::result::Result<Map<String, Value>, String>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            transform: Arc::new(transform),
            result_key: keys::LAST_EVAL_RESULT.to_string(),
            then,
        }
    }

    /// A transform that changes nothing. Used as a placeholder definition
    /// that an injected runtime may replace.
    pub fn noop(name: impl Into<String>, then: Transition) -> Self {
        Self::new(name, then, |_| Ok(Map::new()))
    }

    pub fn with_result_key(mut self, key: impl Into<String>) -> Self {
        self.result_key = key.into();
        self
    }
}

#[async_trait]
impl NodeRuntime for EvalNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Eval
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    async fn execute(&self, state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        let started = Instant::now();
        let patch = (self.transform)(state)
            .map_err(|e| EngineError::node_execution(&self.name, NodeKind::Eval, e))?;

        let updated_keys: Vec<String> = patch.keys().cloned().collect();
        tracing::debug!(node = %self.name, keys = ?updated_keys, "eval produced patch");

        let report = EvalReport {
            success: true,
            updated_keys,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        let mut delta = StateDelta::context_map(patch);
        delta
            .context
            .insert(self.result_key.clone(), serde_json::to_value(&report)?);
        Ok(NodeOutcome::from_delta(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> EngineContext {
        EngineContext::new("test-run")
    }

    #[tokio::test]
    async fn test_eval_merges_patch_and_report() {
        let node = EvalNode::new("SET_FLAG", Transition::end(), |state| {
            let n = state.get_i64("count").unwrap_or(0);
            let mut patch = Map::new();
            patch.insert("count".into(), json!(n + 1));
            Ok(patch)
        });

        let mut state = WorkflowState::new("SET_FLAG");
        state.context.insert("count".into(), json!(41));

        let outcome = node.execute(&state, &ctx()).await.unwrap();
        assert_eq!(outcome.delta.context["count"], json!(42));

        let report = &outcome.delta.context[keys::LAST_EVAL_RESULT];
        assert_eq!(report["success"], json!(true));
        assert_eq!(report["updatedKeys"], json!(["count"]));
    }

    #[tokio::test]
    async fn test_eval_failure_carries_node_context() {
        let node = EvalNode::new("BROKEN", Transition::end(), |_| Err("missing input".into()));
        let err = node
            .execute(&WorkflowState::new("BROKEN"), &ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("BROKEN"));
        assert!(err.to_string().contains("missing input"));
    }

    #[tokio::test]
    async fn test_noop_eval_only_writes_report() {
        let node = EvalNode::noop("NOOP", Transition::end());
        let outcome = node
            .execute(&WorkflowState::new("NOOP"), &ctx())
            .await
            .unwrap();
        assert_eq!(outcome.delta.context.len(), 1);
        assert!(outcome.delta.context.contains_key(keys::LAST_EVAL_RESULT));
    }
}
