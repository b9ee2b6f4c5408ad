//! DAG construction and cycle detection
//!
//! Nodes are keyed `owner/repo#number`; edges reference ids only, so the
//! graph serializes cleanly and ownership stays acyclic even when the
//! dependency relation is not. Cycle detection is a DFS carrying a
//! recursion-stack set: every back-edge produces one [`CycleInfo`] whose
//! node list walks the cycle and ends back at its start.

use std::collections::{BTreeMap, HashSet};

use crate::types::{CycleInfo, DagNode, ResolvedIssue};

/// The dependency DAG, preserving insertion order for stable iteration.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, DagNode>,
    order: Vec<String>,
}

impl DependencyGraph {
    pub fn get(&self, id: &str) -> Option<&DagNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DagNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }
}

/// Build the DAG from resolved issues, populating back-edges.
pub fn build_dag(resolved: Vec<ResolvedIssue>) -> DependencyGraph {
    let mut graph = DependencyGraph::default();

    for issue in resolved {
        let id = issue.dag_id();
        let depends_on: Vec<String> = issue.dependencies.iter().map(|d| d.dag_id()).collect();
        graph.order.push(id.clone());
        graph.nodes.insert(
            id.clone(),
            DagNode {
                id,
                issue,
                depends_on,
                depended_by: Vec::new(),
            },
        );
    }

    // Back-edges, only for dependencies actually present in the graph.
    let edges: Vec<(String, String)> = graph
        .iter()
        .flat_map(|node| {
            node.depends_on
                .iter()
                .map(|dep| (dep.clone(), node.id.clone()))
                .collect::<Vec<_>>()
        })
        .collect();
    for (dep, dependent) in edges {
        if let Some(node) = graph.nodes.get_mut(&dep) {
            node.depended_by.push(dependent);
        }
    }

    graph
}

/// Find every dependency cycle in the graph.
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<CycleInfo> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut cycles = Vec::new();

    for start in &graph.order {
        if !visited.contains(start) {
            let mut stack: Vec<String> = Vec::new();
            let mut on_stack: HashSet<String> = HashSet::new();
            dfs(graph, start, &mut visited, &mut stack, &mut on_stack, &mut cycles);
        }
    }
    cycles
}

fn dfs(
    graph: &DependencyGraph,
    id: &str,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
    on_stack: &mut HashSet<String>,
    cycles: &mut Vec<CycleInfo>,
) {
    visited.insert(id.to_string());
    stack.push(id.to_string());
    on_stack.insert(id.to_string());

    if let Some(node) = graph.get(id) {
        for dep in &node.depends_on {
            if !graph.contains(dep) {
                continue;
            }
            if on_stack.contains(dep) {
                // Back-edge: the cycle runs from dep's position to here.
                let pos = stack.iter().position(|n| n == dep).unwrap_or(0);
                let mut cycle_nodes: Vec<String> = stack[pos..].to_vec();
                cycle_nodes.push(dep.clone());
                let description = cycle_nodes.join(" -> ");
                cycles.push(CycleInfo {
                    has_cycle: true,
                    cycle_nodes,
                    description,
                });
            } else if !visited.contains(dep) {
                dfs(graph, dep, visited, stack, on_stack, cycles);
            }
        }
    }

    stack.pop();
    on_stack.remove(id);
}
