//! Declarative workflow configuration and load-time validation
//!
//! A [`WorkflowConfig`] pairs a declared name set with the node list that
//! implements it. Before an engine is built the config passes three
//! defense layers, applied in order:
//!
//! 1. **Structural** - each node's own `validate()`: required fields
//!    non-empty, numeric ranges honored.
//! 2. **Referential** - every node name is declared, no duplicates, the
//!    sentinels `END`/`ERROR` are not redefined, the entry node exists.
//! 3. **Semantic** - every declared name has exactly one definition, and
//!    nodes unreachable from the entry are reported. Reachability walks
//!    literal transitions only; if *any* node has a dynamic transition the
//!    walk is suppressed (its targets cannot be determined statically).
//!
//! Unreachable nodes are a report, not an error - dynamic workflows
//! legitimately route into nodes no literal edge names.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{EngineError, Result};
use crate::node::NodeRuntime;
use crate::state::{END, ERROR};
use crate::transition::is_sentinel;

/// Declarative definition of one workflow
///
/// The first node in `nodes` is the entry point.
#[derive(Clone)]
pub struct WorkflowConfig {
    /// Workflow identifier, used in logs and run ids.
    pub id: String,

    /// Declared node names. Every node must be listed here and every
    /// listed name must have exactly one node.
    pub schema_names: BTreeSet<String>,

    /// Node list in declaration order; index 0 is the entry.
    pub nodes: Vec<Arc<dyn NodeRuntime>>,

    /// Context seeded into fresh runs.
    pub initial_context: Map<String, Value>,
}

impl WorkflowConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            schema_names: BTreeSet::new(),
            nodes: Vec::new(),
            initial_context: Map::new(),
        }
    }

    /// Declare schema names up front. Adding nodes also declares their
    /// names, so this is only needed to express declared-but-undefined
    /// names (which validation will then reject).
    pub fn with_schema_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Append a node, declaring its name.
    pub fn with_node(mut self, node: Arc<dyn NodeRuntime>) -> Self {
        self.schema_names.insert(node.name().to_string());
        self.nodes.push(node);
        self
    }

    /// Seed the initial context for fresh runs.
    pub fn with_initial_context(mut self, context: Map<String, Value>) -> Self {
        self.initial_context = context;
        self
    }

    /// Entry node name (the first declared node).
    pub fn entry(&self) -> Option<&str> {
        self.nodes.first().map(|n| n.name())
    }

    /// Run all three validation layers. Returns the semantic report on
    /// success; fails fast with [`EngineError::Config`] otherwise.
    pub fn validate(&self) -> Result<ValidationReport> {
        if self.id.is_empty() {
            return Err(EngineError::config("workflow id must not be empty"));
        }
        if self.nodes.is_empty() {
            return Err(EngineError::config(format!(
                "workflow '{}' declares no nodes",
                self.id
            )));
        }

        // Layer 1: structural, per node.
        for node in &self.nodes {
            node.validate()?;
        }

        // Layer 2: referential.
        let mut seen: HashSet<&str> = HashSet::new();
        for node in &self.nodes {
            let name = node.name();
            if name.is_empty() {
                return Err(EngineError::config("node with empty name"));
            }
            if is_sentinel(name) {
                return Err(EngineError::config(format!(
                    "node name '{}' redefines a reserved sentinel",
                    name
                )));
            }
            if !seen.insert(name) {
                return Err(EngineError::config(format!(
                    "duplicate node name '{}'",
                    name
                )));
            }
            if !self.schema_names.contains(name) {
                return Err(EngineError::config(format!(
                    "node '{}' is not in the schema name set",
                    name
                )));
            }
        }
        if self.schema_names.contains(END) || self.schema_names.contains(ERROR) {
            return Err(EngineError::config(
                "schema names must not include the reserved sentinels",
            ));
        }

        // Literal targets must exist. Dynamic targets are checked at
        // runtime by the transition resolver.
        for node in &self.nodes {
            if let Some(target) = node.transition().literal_target() {
                if !is_sentinel(target) && !self.schema_names.contains(target) {
                    return Err(EngineError::config(format!(
                        "node '{}' transitions to unknown node '{}'",
                        node.name(),
                        target
                    )));
                }
            }
        }

        // Layer 3: semantic.
        for name in &self.schema_names {
            if !seen.contains(name.as_str()) {
                return Err(EngineError::config(format!(
                    "schema name '{}' has no node definition",
                    name
                )));
            }
        }

        let report = self.reachability_report();
        for name in &report.unreachable {
            tracing::warn!(workflow = %self.id, node = %name, "node unreachable from entry");
        }
        Ok(report)
    }

    fn reachability_report(&self) -> ValidationReport {
        if self.nodes.iter().any(|n| n.transition().is_dynamic()) {
            return ValidationReport {
                reachability_checked: false,
                unreachable: Vec::new(),
            };
        }

        let entry = match self.entry() {
            Some(entry) => entry.to_string(),
            None => {
                return ValidationReport {
                    reachability_checked: false,
                    unreachable: Vec::new(),
                }
            }
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue = VecDeque::from([entry]);
        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let node = self.nodes.iter().find(|n| n.name() == name);
            if let Some(target) = node.and_then(|n| n.transition().literal_target()) {
                if !is_sentinel(target) && !visited.contains(target) {
                    queue.push_back(target.to_string());
                }
            }
        }

        let unreachable = self
            .nodes
            .iter()
            .map(|n| n.name().to_string())
            .filter(|name| !visited.contains(name))
            .collect();
        ValidationReport {
            reachability_checked: true,
            unreachable,
        }
    }
}

impl std::fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("id", &self.id)
            .field("schema_names", &self.schema_names)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

/// Outcome of the semantic validation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// False when a dynamic transition suppressed the reachability walk.
    pub reachability_checked: bool,

    /// Nodes no chain of literal transitions reaches from the entry.
    pub unreachable: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{EngineContext, NodeKind, NodeOutcome};
    use crate::state::WorkflowState;
    use crate::transition::Transition;
    use async_trait::async_trait;

    struct StubNode {
        name: String,
        then: Transition,
    }

    impl StubNode {
        fn arc(name: &str, then: Transition) -> Arc<dyn NodeRuntime> {
            Arc::new(Self {
                name: name.to_string(),
                then,
            })
        }
    }

    #[async_trait]
    impl NodeRuntime for StubNode {
        fn name(&self) -> &str {
            &self.name
        }
        fn kind(&self) -> NodeKind {
            NodeKind::Eval
        }
        fn transition(&self) -> &Transition {
            &self.then
        }
        async fn execute(
            &self,
            _state: &WorkflowState,
            _ctx: &EngineContext,
        ) -> crate::error::Result<NodeOutcome> {
            Ok(NodeOutcome::empty())
        }
    }

    #[test]
    fn test_single_node_to_end_is_valid() {
        let config = WorkflowConfig::new("w").with_node(StubNode::arc("ONLY", Transition::end()));
        let report = config.validate().unwrap();
        assert!(report.reachability_checked);
        assert!(report.unreachable.is_empty());
    }

    #[test]
    fn test_empty_workflow_rejected() {
        assert!(WorkflowConfig::new("w").validate().is_err());
        assert!(WorkflowConfig::new("")
            .with_node(StubNode::arc("A", Transition::end()))
            .validate()
            .is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let config = WorkflowConfig::new("w")
            .with_node(StubNode::arc("A", Transition::end()))
            .with_node(StubNode::arc("A", Transition::end()));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_sentinel_redefinition_rejected() {
        let config = WorkflowConfig::new("w").with_node(StubNode::arc("END", Transition::end()));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_declared_but_undefined_name_rejected() {
        let config = WorkflowConfig::new("w")
            .with_schema_names(["GHOST"])
            .with_node(StubNode::arc("A", Transition::end()));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GHOST"));
    }

    #[test]
    fn test_literal_edge_to_unknown_node_rejected() {
        let config = WorkflowConfig::new("w").with_node(StubNode::arc("A", Transition::to("B")));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown node 'B'"));
    }

    #[test]
    fn test_unreachable_node_reported() {
        let config = WorkflowConfig::new("w")
            .with_node(StubNode::arc("A", Transition::end()))
            .with_node(StubNode::arc("ORPHAN", Transition::end()));
        let report = config.validate().unwrap();
        assert!(report.reachability_checked);
        assert_eq!(report.unreachable, vec!["ORPHAN".to_string()]);
    }

    #[test]
    fn test_dynamic_transition_suppresses_reachability() {
        let config = WorkflowConfig::new("w")
            .with_node(StubNode::arc(
                "A",
                Transition::when(|_| "ORPHAN".to_string()),
            ))
            .with_node(StubNode::arc("ORPHAN", Transition::end()));
        let report = config.validate().unwrap();
        assert!(!report.reachability_checked);
        assert!(report.unreachable.is_empty());
    }

    #[test]
    fn test_chain_reachability() {
        let config = WorkflowConfig::new("w")
            .with_node(StubNode::arc("A", Transition::to("B")))
            .with_node(StubNode::arc("B", Transition::to("C")))
            .with_node(StubNode::arc("C", Transition::end()));
        let report = config.validate().unwrap();
        assert!(report.unreachable.is_empty());
    }
}
