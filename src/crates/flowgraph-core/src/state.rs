//! Workflow run state and the shallow-merge delta model
//!
//! A [`WorkflowState`] is the persisted record of a single run: the node to
//! execute next, the run status, a timestamp rewritten on every mutation,
//! an opaque conversation history, and a string-keyed context map that
//! nodes read and patch.
//!
//! Nodes never mutate the state they are handed. They return a
//! [`StateDelta`] - a partial record the engine merges in: `context` keys
//! shallow-merge, `conversation_history` entries append, scalar fields
//! replace when present. Keys prefixed `__` are reserved for the engine.
//!
//! # Terminality
//!
//! A run is terminal iff `current_node` is one of the sentinels [`END`] /
//! [`ERROR`] or `status` is completed/failed. The engine couples the two:
//! advancing to `END` sets `completed`, advancing to `ERROR` (or exhausting
//! retries) sets `failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sentinel transition target marking successful completion.
pub const END: &str = "END";

/// Sentinel transition target marking failure.
pub const ERROR: &str = "ERROR";

/// Prefix for engine-managed context keys. Node-written keys never collide.
pub const RESERVED_PREFIX: &str = "__";

/// Lifecycle status of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Paused,
}

impl WorkflowStatus {
    /// Whether this status ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }
}

/// The persisted record of a single workflow run
///
/// Serialized camelCase so snapshots on disk read `currentNode`,
/// `updatedAt`, `conversationHistory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    /// Name of the node to execute next, or a sentinel when finished.
    pub current_node: String,

    /// Run lifecycle status. Coupled to `current_node` at the terminals.
    pub status: WorkflowStatus,

    /// Rewritten on every mutation; monotonically non-decreasing across
    /// persisted snapshots of the same run.
    pub updated_at: DateTime<Utc>,

    /// Opaque ordered message records. The engine never interprets these;
    /// nodes may append.
    #[serde(default)]
    pub conversation_history: Vec<Value>,

    /// Per-run keyed data. Nodes read it and return partial maps that are
    /// shallow-merged in.
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl WorkflowState {
    /// Fresh state positioned at `entry` with status `running`.
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            current_node: entry.into(),
            status: WorkflowStatus::Running,
            updated_at: Utc::now(),
            conversation_history: Vec::new(),
            context: Map::new(),
        }
    }

    /// Fresh state with an initial context.
    pub fn with_context(entry: impl Into<String>, context: Map<String, Value>) -> Self {
        Self {
            context,
            ..Self::new(entry)
        }
    }

    /// True when the run can make no further progress.
    pub fn is_terminal(&self) -> bool {
        self.current_node == END || self.current_node == ERROR || self.status.is_terminal()
    }

    /// Read a context value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    /// Read a context value as `&str`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }

    /// Read a context value as `i64`.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.context.get(key).and_then(Value::as_i64)
    }

    /// Read a context value as `bool`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.context.get(key).and_then(Value::as_bool)
    }

    /// Refresh `updated_at`, never letting it move backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Merge a delta into this state and refresh the timestamp.
    ///
    /// `context` keys shallow-merge (last write wins per key),
    /// `conversation_history` entries append, `current_node` and `status`
    /// replace when the delta carries them.
    pub fn apply(&mut self, delta: StateDelta) {
        if let Some(node) = delta.current_node {
            self.current_node = node;
        }
        if let Some(status) = delta.status {
            self.status = status;
        }
        self.conversation_history.extend(delta.conversation_history);
        for (key, value) in delta.context {
            self.context.insert(key, value);
        }
        self.touch();
    }
}

/// A partial update over [`WorkflowState`], returned by node execution
///
/// Typically only `context` (and sometimes `conversation_history`) is
/// populated; the engine owns `current_node`/`status` transitions.
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    /// Replacement for `current_node`, if any.
    pub current_node: Option<String>,

    /// Replacement for `status`, if any.
    pub status: Option<WorkflowStatus>,

    /// Records appended to the conversation history.
    pub conversation_history: Vec<Value>,

    /// Keys shallow-merged into `context`.
    pub context: Map<String, Value>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta that merges a single context key.
    pub fn context_value(key: impl Into<String>, value: Value) -> Self {
        let mut delta = Self::default();
        delta.context.insert(key.into(), value);
        delta
    }

    /// Delta that merges a whole context map.
    pub fn context_map(map: Map<String, Value>) -> Self {
        Self {
            context: map,
            ..Self::default()
        }
    }

    /// Builder-style context insert.
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Builder-style history append.
    pub fn with_message(mut self, message: Value) -> Self {
        self.conversation_history.push(message);
        self
    }

    /// True when applying this delta would change nothing.
    pub fn is_empty(&self) -> bool {
        self.current_node.is_none()
            && self.status.is_none()
            && self.conversation_history.is_empty()
            && self.context.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_state_is_running_at_entry() {
        let state = WorkflowState::new("ANALYZE");
        assert_eq!(state.current_node, "ANALYZE");
        assert_eq!(state.status, WorkflowStatus::Running);
        assert!(!state.is_terminal());
    }

    #[test]
    fn test_terminality() {
        let mut state = WorkflowState::new("A");
        state.current_node = END.to_string();
        assert!(state.is_terminal());

        let mut state = WorkflowState::new("A");
        state.current_node = ERROR.to_string();
        assert!(state.is_terminal());

        let mut state = WorkflowState::new("A");
        state.status = WorkflowStatus::Failed;
        assert!(state.is_terminal());
    }

    #[test]
    fn test_apply_shallow_merges_context() {
        let mut state = WorkflowState::new("A");
        state.context.insert("keep".into(), json!(1));
        state.context.insert("replace".into(), json!("old"));

        let delta = StateDelta::new()
            .with_context("replace", json!("new"))
            .with_context("added", json!(true));
        state.apply(delta);

        assert_eq!(state.context["keep"], json!(1));
        assert_eq!(state.context["replace"], json!("new"));
        assert_eq!(state.context["added"], json!(true));
    }

    #[test]
    fn test_apply_appends_history() {
        let mut state = WorkflowState::new("A");
        state.apply(StateDelta::new().with_message(json!({"role": "user"})));
        state.apply(StateDelta::new().with_message(json!({"role": "assistant"})));
        assert_eq!(state.conversation_history.len(), 2);
    }

    #[test]
    fn test_updated_at_never_regresses() {
        let mut state = WorkflowState::new("A");
        let before = state.updated_at;
        state.apply(StateDelta::new());
        assert!(state.updated_at >= before);
    }

    #[test]
    fn test_serde_round_trip_camel_case() {
        let mut state = WorkflowState::new("IMPLEMENT");
        state.context.insert("issueNumber".into(), json!(42));

        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("currentNode").is_some());
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("conversationHistory").is_some());

        let back: WorkflowState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_value(WorkflowStatus::Running).unwrap(),
            json!("running")
        );
        assert_eq!(
            serde_json::to_value(WorkflowStatus::Completed).unwrap(),
            json!("completed")
        );
    }

    #[test]
    fn test_delta_is_empty() {
        assert!(StateDelta::new().is_empty());
        assert!(!StateDelta::context_value("k", json!(1)).is_empty());
    }
}
