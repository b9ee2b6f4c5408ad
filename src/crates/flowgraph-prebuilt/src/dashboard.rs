//! Mermaid dashboard emission and PR-body upsert
//!
//! The dashboard is a self-contained Markdown block: a
//! `stateDiagram-v2` whose nodes carry CSS classes derived from the run
//! state, plus a status table (current task, attempt ratio, logs link).
//! It is embedded into a PR body between a marker pair keyed by run id:
//!
//! ```text
//! <!-- foundry-workflow-dashboard:<runId> -->
//! ...block...
//! <!-- /foundry-workflow-dashboard:<runId> -->
//! ```
//!
//! [`upsert_dashboard`] replaces the span between existing markers or
//! appends the block when absent; prose outside the markers is preserved
//! byte-exact, and upserting the same payload twice is a no-op.

use std::collections::HashSet;

/// Marker family name. Stable across runs; the id distinguishes runs.
const MARKER_NAME: &str = "foundry-workflow-dashboard";

/// Render status of one diagram node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRenderStatus {
    Completed,
    Active,
    Failed,
    Pending,
}

impl NodeRenderStatus {
    pub fn css_class(self) -> &'static str {
        match self {
            NodeRenderStatus::Completed => "completed",
            NodeRenderStatus::Active => "active",
            NodeRenderStatus::Failed => "failed",
            NodeRenderStatus::Pending => "pending",
        }
    }
}

/// Derive the render status for every node.
///
/// Precedence: failed > active > completed > pending.
pub fn derive_statuses(
    nodes: &[String],
    active: &str,
    completed: &HashSet<String>,
    failed: &HashSet<String>,
) -> Vec<(String, NodeRenderStatus)> {
    nodes
        .iter()
        .map(|name| {
            let status = if failed.contains(name) {
                NodeRenderStatus::Failed
            } else if name == active {
                NodeRenderStatus::Active
            } else if completed.contains(name) {
                NodeRenderStatus::Completed
            } else {
                NodeRenderStatus::Pending
            };
            (name.clone(), status)
        })
        .collect()
}

/// Graph shape fed to the diagram renderer.
#[derive(Debug, Clone)]
pub struct DiagramSpec {
    pub nodes: Vec<String>,
    /// Edges; `END` is always a valid target and renders as `[*]`.
    pub edges: Vec<(String, String)>,
    pub active: String,
    /// Mermaid direction, typically `LR` or `TB`.
    pub direction: String,
}

fn mermaid_id(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Render the `stateDiagram-v2` with status classes. No Mermaid backend
/// is required; this is plain text for the host to render.
pub fn render_state_diagram(
    spec: &DiagramSpec,
    completed: &HashSet<String>,
    failed: &HashSet<String>,
) -> String {
    let mut out = String::new();
    out.push_str("stateDiagram-v2\n");
    out.push_str(&format!("    direction {}\n", spec.direction));
    out.push_str("    classDef completed fill:#d3f9d8,stroke:#2b8a3e\n");
    out.push_str("    classDef active fill:#fff3bf,stroke:#e67700\n");
    out.push_str("    classDef failed fill:#ffe3e3,stroke:#c92a2a\n");
    out.push_str("    classDef pending fill:#f1f3f5,stroke:#868e96\n");

    for (from, to) in &spec.edges {
        let target = if to == "END" {
            "[*]".to_string()
        } else {
            mermaid_id(to)
        };
        out.push_str(&format!("    {} --> {}\n", mermaid_id(from), target));
    }

    for (name, status) in derive_statuses(&spec.nodes, &spec.active, completed, failed) {
        out.push_str(&format!(
            "    class {} {}\n",
            mermaid_id(&name),
            status.css_class()
        ));
    }
    out
}

/// Metadata rendered into the status table.
#[derive(Debug, Clone)]
pub struct DashboardSpec {
    /// Keys the marker pair; usually the run id.
    pub marker_id: String,
    pub title: String,
    pub current_task: String,
    pub retry_attempt: Option<u32>,
    pub max_retries: Option<u32>,
    pub actions_run_url: Option<String>,
}

fn marker_open(id: &str) -> String {
    format!("<!-- {MARKER_NAME}:{id} -->")
}

fn marker_close(id: &str) -> String {
    format!("<!-- /{MARKER_NAME}:{id} -->")
}

/// Render the full dashboard block, markers included.
pub fn render_dashboard(
    spec: &DashboardSpec,
    diagram: &DiagramSpec,
    completed: &HashSet<String>,
    failed: &HashSet<String>,
) -> String {
    let mut out = String::new();
    out.push_str(&marker_open(&spec.marker_id));
    out.push('\n');
    out.push_str(&format!("## {}\n\n", spec.title));
    out.push_str("```mermaid\n");
    out.push_str(&render_state_diagram(diagram, completed, failed));
    out.push_str("```\n\n");

    out.push_str("| | |\n|---|---|\n");
    out.push_str(&format!("| **Current task** | {} |\n", spec.current_task));
    if let (Some(attempt), Some(max)) = (spec.retry_attempt, spec.max_retries) {
        out.push_str(&format!("| **Attempt** | {attempt} / {max} |\n"));
    }
    if let Some(url) = &spec.actions_run_url {
        out.push_str(&format!("| **Logs** | [Actions run]({url}) |\n"));
    }
    out.push_str(&marker_close(&spec.marker_id));
    out
}

/// Where to place a block when the body has no markers yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertPosition {
    Top,
    #[default]
    Bottom,
}

/// Replace the marker-delimited span of `body` with `block`, or insert
/// the block when no markers exist. Everything outside the span is
/// preserved byte-exact.
pub fn upsert_dashboard(
    body: &str,
    block: &str,
    marker_id: &str,
    position: UpsertPosition,
) -> String {
    let open = marker_open(marker_id);
    let close = marker_close(marker_id);

    if let Some(start) = body.find(&open) {
        if let Some(close_start) = body[start..].find(&close) {
            let end = start + close_start + close.len();
            let mut out = String::with_capacity(body.len() + block.len());
            out.push_str(&body[..start]);
            out.push_str(block);
            out.push_str(&body[end..]);
            return out;
        }
    }

    if body.is_empty() {
        return block.to_string();
    }
    match position {
        UpsertPosition::Bottom => format!("{body}\n\n{block}"),
        UpsertPosition::Top => format!("{block}\n\n{body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn diagram(active: &str) -> DiagramSpec {
        DiagramSpec {
            nodes: vec!["ANALYZE".into(), "PLAN".into(), "TEST".into()],
            edges: vec![
                ("ANALYZE".into(), "PLAN".into()),
                ("PLAN".into(), "TEST".into()),
                ("TEST".into(), "END".into()),
            ],
            active: active.to_string(),
            direction: "LR".into(),
        }
    }

    fn spec() -> DashboardSpec {
        DashboardSpec {
            marker_id: "run-1".into(),
            title: "Issue #7".into(),
            current_task: "t1: wire the parser".into(),
            retry_attempt: Some(1),
            max_retries: Some(3),
            actions_run_url: Some("https://example.com/runs/9".into()),
        }
    }

    #[test]
    fn test_status_precedence() {
        let statuses = derive_statuses(
            &["A".into(), "B".into(), "C".into(), "D".into()],
            "B",
            &set(&["A", "B", "C"]),
            &set(&["C"]),
        );
        assert_eq!(statuses[0].1, NodeRenderStatus::Completed);
        assert_eq!(statuses[1].1, NodeRenderStatus::Active); // active beats completed
        assert_eq!(statuses[2].1, NodeRenderStatus::Failed); // failed beats completed
        assert_eq!(statuses[3].1, NodeRenderStatus::Pending);
    }

    #[test]
    fn test_diagram_renders_classes_and_terminal_edge() {
        let out = render_state_diagram(&diagram("PLAN"), &set(&["ANALYZE"]), &set(&[]));
        assert!(out.starts_with("stateDiagram-v2\n    direction LR\n"));
        assert!(out.contains("ANALYZE --> PLAN"));
        assert!(out.contains("TEST --> [*]"));
        assert!(out.contains("class ANALYZE completed"));
        assert!(out.contains("class PLAN active"));
        assert!(out.contains("class TEST pending"));
    }

    #[test]
    fn test_dashboard_block_contains_table_and_markers() {
        let block = render_dashboard(&spec(), &diagram("PLAN"), &set(&[]), &set(&[]));
        assert!(block.starts_with("<!-- foundry-workflow-dashboard:run-1 -->"));
        assert!(block.ends_with("<!-- /foundry-workflow-dashboard:run-1 -->"));
        assert!(block.contains("| **Attempt** | 1 / 3 |"));
        assert!(block.contains("[Actions run](https://example.com/runs/9)"));
    }

    #[test]
    fn test_upsert_appends_then_replaces() {
        let block1 = render_dashboard(&spec(), &diagram("PLAN"), &set(&[]), &set(&[]));
        let prose = "Human-written summary.\n\nMore prose.";

        let once = upsert_dashboard(prose, &block1, "run-1", UpsertPosition::Bottom);
        assert!(once.starts_with(prose));
        assert!(once.contains(&block1));

        // Updated payload replaces in place; prose is untouched.
        let block2 = render_dashboard(&spec(), &diagram("TEST"), &set(&["PLAN"]), &set(&[]));
        let twice = upsert_dashboard(&once, &block2, "run-1", UpsertPosition::Bottom);
        assert!(twice.starts_with(prose));
        assert!(twice.contains(&block2));
        assert!(!twice.contains(&block1));
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let block = render_dashboard(&spec(), &diagram("PLAN"), &set(&[]), &set(&[]));
        let body = "before\n\nafter";
        let once = upsert_dashboard(body, &block, "run-1", UpsertPosition::Bottom);
        let twice = upsert_dashboard(&once, &block, "run-1", UpsertPosition::Bottom);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_upsert_top_position() {
        let out = upsert_dashboard("prose", "<!-- foundry-workflow-dashboard:x -->b<!-- /foundry-workflow-dashboard:x -->", "x", UpsertPosition::Top);
        assert!(out.starts_with("<!-- foundry-workflow-dashboard:x -->"));
        assert!(out.ends_with("prose"));
    }

    #[test]
    fn test_distinct_marker_ids_do_not_collide() {
        let block_a = "<!-- foundry-workflow-dashboard:a -->A<!-- /foundry-workflow-dashboard:a -->";
        let block_b = "<!-- foundry-workflow-dashboard:b -->B<!-- /foundry-workflow-dashboard:b -->";
        let body = upsert_dashboard("", block_a, "a", UpsertPosition::Bottom);
        let body = upsert_dashboard(&body, block_b, "b", UpsertPosition::Bottom);
        assert!(body.contains("A") && body.contains("B"));

        let updated_a = "<!-- foundry-workflow-dashboard:a -->A2<!-- /foundry-workflow-dashboard:a -->";
        let body = upsert_dashboard(&body, updated_a, "a", UpsertPosition::Bottom);
        assert!(body.contains("A2") && body.contains("B"));
    }
}
