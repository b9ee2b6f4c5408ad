//! Prebuilt flowgraph workflows
//!
//! Two flagship workflows assembled from the generic node kinds:
//!
//! - [`issue_processor`] - drives a single issue through
//!   analyze → plan → create-PR → iterate(implement, test, update-PR)
//!   → finalize, with bounded per-task fix attempts and a live Mermaid
//!   dashboard upserted into the PR body.
//! - [`dispatch_workflow`] - runs the dependency resolver and emits the
//!   batch matrix.
//!
//! [`dashboard`] holds the Mermaid emission and the idempotent PR-body
//! upsert used by both the per-iteration and the final PR status steps.

pub mod context;
pub mod dashboard;
pub mod dispatch;
pub mod issue_processor;

pub use context::{Complexity, Task};
pub use dashboard::{
    derive_statuses, render_dashboard, render_state_diagram, upsert_dashboard, DashboardSpec,
    DiagramSpec, NodeRenderStatus, UpsertPosition,
};
pub use dispatch::dispatch_workflow;
pub use issue_processor::{
    issue_processor, CommandOverrides, IssueProcessorDeps, IssueProcessorOptions,
};
