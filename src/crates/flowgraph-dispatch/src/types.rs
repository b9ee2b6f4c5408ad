//! Dispatch graph entities
//!
//! Ownership is a single chain: the fetcher constructs a [`QueuedIssue`],
//! resolution moves it into a [`ResolvedIssue`], the DAG moves that into a
//! [`DagNode`]. Edges between nodes are `owner/repo#number` id strings -
//! cycles exist logically via ids but never via references.

use serde::{Deserialize, Serialize};

/// Open/closed state of a tracker issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

/// An issue as fetched from the tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub state: IssueState,
    #[serde(default)]
    pub labels: Vec<String>,
    pub owner: String,
    pub repo: String,
    pub url: String,
    /// `None` until the sub-issues edge has been queried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_issue_numbers: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_issue_number: Option<u64>,
    /// Priority extracted from the project field, when fetched from a
    /// project board.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_priority: Option<String>,
}

impl QueuedIssue {
    /// DAG id: `owner/repo#number`.
    pub fn dag_id(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.number)
    }

    /// `owner/repo` form used in the matrix wire format.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Cross-repo reference to a dependency issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl DependencyRef {
    pub fn dag_id(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Dispatch eligibility of a resolved issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResolutionStatus {
    Ready,
    Blocked,
    Closed,
}

/// Priority levels, lowest score dispatches first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    None,
}

impl Priority {
    /// Ordering score: critical=0 ... none=4.
    pub fn score(self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
            Priority::None => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::None => "none",
        }
    }
}

/// An issue after dependency resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIssue {
    pub issue: QueuedIssue,
    pub status: ResolutionStatus,
    /// All sub-issues, open or closed.
    pub dependencies: Vec<DependencyRef>,
    /// The sub-issues that are still open.
    pub blocked_by: Vec<DependencyRef>,
    pub priority: Priority,
    pub priority_score: u8,
    /// No sub-issues at all. Only leaves are dispatched.
    pub is_leaf: bool,
}

impl ResolvedIssue {
    pub fn dag_id(&self) -> String {
        self.issue.dag_id()
    }
}

/// One node of the dependency DAG, keyed `owner/repo#number`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DagNode {
    pub id: String,
    pub issue: ResolvedIssue,
    pub depends_on: Vec<String>,
    pub depended_by: Vec<String>,
}

/// A detected dependency cycle. A warning, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleInfo {
    pub has_cycle: bool,
    /// The cycle path, ending back at its first node.
    pub cycle_nodes: Vec<String>,
    pub description: String,
}

/// One row of the dispatch matrix. Snake_case is the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub issue_number: u64,
    pub title: String,
    pub priority: String,
    pub priority_score: u8,
    pub repository: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_issue_number: Option<u64>,
}

/// The emitted batch plan: `{"include": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchMatrix {
    pub include: Vec<MatrixEntry>,
}
