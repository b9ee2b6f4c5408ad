//! Error types and error handling for workflow execution
//!
//! All errors implement `std::error::Error` via `thiserror`. The variants
//! follow the engine's semantic taxonomy rather than host-library shapes:
//! configuration problems fail fast at load, node failures are retried and
//! then surfaced with node name and kind attached, transition violations
//! carry the offending value plus the valid name set.

use thiserror::Error;

use crate::node::NodeKind;

/// Convenience result type using [`EngineError`]
pub type Result<T> = std::result::Result<T, EngineError>;

/// Comprehensive error type for workflow construction and execution
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed workflow at load: missing id/nodes, field-shape mismatch,
    /// duplicate names, reserved-name reuse, unknown literal target.
    ///
    /// Config errors fail fast - the engine never starts.
    #[error("Workflow configuration invalid: {0}")]
    Config(String),

    /// Runtime lookup miss: the state names a node the table doesn't have
    /// (schema and table drifted, or a stale snapshot).
    #[error("Unknown node '{node}'")]
    UnknownNode {
        /// Name the state asked for
        node: String,
    },

    /// A transition predicate returned a name that is neither a schema
    /// name nor a terminal sentinel.
    #[error("Invalid transition from '{from}': '{returned}' is not a known node or sentinel (valid: {valid:?})")]
    InvalidTransition {
        /// Node whose transition produced the value
        from: String,
        /// The offending value
        returned: String,
        /// Names that would have been accepted
        valid: Vec<String>,
    },

    /// A node's execute failed (or a provider returned a structured
    /// failure with `throw_on_error` set). Retried by the engine up to
    /// `max_retries` before bubbling to the caller.
    #[error("Node '{node}' ({kind}) execution failed: {error}")]
    NodeExecution {
        /// Name of the failing node
        node: String,
        /// Kind tag of the failing node
        kind: NodeKind,
        /// Underlying error description
        error: String,
    },

    /// An upstream collaborator (tracker, LLM, HTTP endpoint) signalled a
    /// typed failure.
    #[error("Provider error: {0}")]
    Provider(String),

    /// A subprocess or HTTP request exceeded its bound.
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out
        operation: String,
        /// Configured bound in milliseconds
        duration_ms: u64,
    },

    /// Snapshot persistence failed.
    #[error("State store error: {0}")]
    Store(#[from] flowgraph_store::StoreError),

    /// State could not be serialized to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a node execution error with node context attached.
    pub fn node_execution(
        node: impl Into<String>,
        kind: NodeKind,
        error: impl Into<String>,
    ) -> Self {
        Self::NodeExecution {
            node: node.into(),
            kind,
            error: error.into(),
        }
    }

    /// Create a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_execution_display_carries_context() {
        let err = EngineError::node_execution("TEST", NodeKind::Command, "exit 1");
        assert_eq!(
            err.to_string(),
            "Node 'TEST' (command) execution failed: exit 1"
        );
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = EngineError::InvalidTransition {
            from: "PLAN".into(),
            returned: "NOPE".into(),
            valid: vec!["A".into(), "END".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("PLAN"));
        assert!(msg.contains("NOPE"));
        assert!(msg.contains("END"));
    }
}
