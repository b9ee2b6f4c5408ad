//! The uniform node contract
//!
//! Every node kind - agent call, subprocess, HTTP request, pure context
//! transform - implements [`NodeRuntime`]. The engine drives the contract:
//! it calls `execute` with an immutable borrow of the current state (direct
//! mutation is impossible; all writes travel in the returned
//! [`NodeOutcome`]), merges the delta, then consults the node's
//! [`Transition`] with the merged state.
//!
//! Nodes that own external resources (child processes, sockets) must
//! release them on every exit path, including timeout and cancellation.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::state::{StateDelta, WorkflowState};
use crate::transition::Transition;

/// Closed set of node kinds, used for logging and error tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Agent,
    Command,
    SlashCommand,
    Eval,
    DynamicAgent,
    DynamicCommand,
    Llm,
    Http,
    GitCheckout,
    Dispatch,
    ProjectStatus,
    Comment,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            NodeKind::Agent => "agent",
            NodeKind::Command => "command",
            NodeKind::SlashCommand => "slash_command",
            NodeKind::Eval => "eval",
            NodeKind::DynamicAgent => "dynamic_agent",
            NodeKind::DynamicCommand => "dynamic_command",
            NodeKind::Llm => "llm",
            NodeKind::Http => "http",
            NodeKind::GitCheckout => "git_checkout",
            NodeKind::Dispatch => "dispatch",
            NodeKind::ProjectStatus => "project_status",
            NodeKind::Comment => "comment",
        };
        f.write_str(tag)
    }
}

/// Engine-supplied execution context, shared by every node in a run.
#[derive(Debug, Clone)]
pub struct EngineContext {
    /// Identifier of the run being executed. Keys the persisted snapshot
    /// and the dashboard marker.
    pub run_id: String,
}

impl EngineContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }
}

/// Result of one node execution
#[derive(Debug, Default)]
pub struct NodeOutcome {
    /// Patch merged into the run state.
    pub delta: StateDelta,

    /// Advisory metadata for logging; never merged into state.
    pub metadata: Option<Value>,
}

impl NodeOutcome {
    /// Outcome that changes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Outcome carrying only a state patch.
    pub fn from_delta(delta: StateDelta) -> Self {
        Self {
            delta,
            metadata: None,
        }
    }

    /// Attach advisory metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Contract implemented by every node kind
#[async_trait]
pub trait NodeRuntime: Send + Sync {
    /// Unique name within the workflow.
    fn name(&self) -> &str;

    /// Kind tag for logging and error context.
    fn kind(&self) -> NodeKind;

    /// Successor declaration, consulted after `execute` with merged state.
    fn transition(&self) -> &Transition;

    /// Structural self-check run at load time (required fields non-empty,
    /// numeric ranges honored). Default: nothing to check.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Perform the node's side effect and return a state patch.
    ///
    /// Implementations must not rely on mutating `state`; the engine hands
    /// out an immutable borrow and merges only the returned delta.
    async fn execute(&self, state: &WorkflowState, ctx: &EngineContext) -> Result<NodeOutcome>;

    /// Resolve the next node name from the merged state.
    fn resolve_next(&self, state: &WorkflowState) -> String {
        self.transition().resolve(state)
    }
}
