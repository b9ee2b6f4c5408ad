//! Fetching and dependency resolution
//!
//! [`DispatchResolver`] drives the full pipeline against the tracker
//! seams. Resolution itself ([`resolve_issues`]) is a pure function over
//! fetched issues plus the sub-issue state cache, so the interesting
//! rules test without any client:
//!
//! - an issue's dependencies are exactly its sub-issues;
//! - open sub-issues block; `CLOSED` > `BLOCKED` > `READY`;
//! - a leaf has no sub-issues, and only leaves ever dispatch.
//!
//! A failed sub-issues query downgrades to "no sub-issues" for that issue
//! (the edge is optional per tenant); a failed project validation aborts
//! the run.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{DispatchConfig, SourceType};
use crate::dag::{build_dag, detect_cycles};
use crate::error::DispatchError;
use crate::matrix::{build_matrix, partition};
use crate::priority::extract_priority;
use crate::tracker::{IssueClient, ProjectClient};
use crate::types::{
    CycleInfo, DependencyRef, DispatchMatrix, IssueState, QueuedIssue, ResolutionStatus,
    ResolvedIssue,
};

/// Result of a full dispatch resolution
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub matrix: DispatchMatrix,
    pub cycles: Vec<CycleInfo>,
    /// DAG ids of issues held back (blocked, closed, aggregator, cyclic).
    pub blocked_ids: Vec<String>,
    pub total_fetched: usize,
}

/// Pure resolution step: fetched issues + sub-issue states in,
/// [`ResolvedIssue`]s out.
pub fn resolve_issues(
    issues: Vec<QueuedIssue>,
    sub_states: &HashMap<String, IssueState>,
) -> Vec<ResolvedIssue> {
    issues
        .into_iter()
        .map(|issue| {
            let sub_numbers = issue.sub_issue_numbers.clone().unwrap_or_default();
            let dependencies: Vec<DependencyRef> = sub_numbers
                .iter()
                .map(|&number| DependencyRef {
                    owner: issue.owner.clone(),
                    repo: issue.repo.clone(),
                    number,
                })
                .collect();

            // Unknown cached state counts as open: it can only hold an
            // issue back, never dispatch one prematurely.
            let blocked_by: Vec<DependencyRef> = dependencies
                .iter()
                .filter(|dep| {
                    sub_states
                        .get(&dep.dag_id())
                        .map(|state| *state == IssueState::Open)
                        .unwrap_or(true)
                })
                .cloned()
                .collect();

            let status = if issue.state == IssueState::Closed {
                ResolutionStatus::Closed
            } else if !blocked_by.is_empty() {
                ResolutionStatus::Blocked
            } else {
                ResolutionStatus::Ready
            };

            let priority = extract_priority(&issue);
            let is_leaf = sub_numbers.is_empty();

            ResolvedIssue {
                priority_score: priority.score(),
                priority,
                status,
                dependencies,
                blocked_by,
                is_leaf,
                issue,
            }
        })
        .collect()
}

/// Fetch → resolve → DAG → partition → matrix
pub struct DispatchResolver {
    issues: Arc<dyn IssueClient>,
    project: Option<Arc<dyn ProjectClient>>,
    config: DispatchConfig,
}

impl DispatchResolver {
    pub fn new(
        issues: Arc<dyn IssueClient>,
        project: Option<Arc<dyn ProjectClient>>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            issues,
            project,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Fetch the queue according to the configured source.
    pub async fn fetch(&self) -> Result<Vec<QueuedIssue>, DispatchError> {
        match self.config.source {
            SourceType::Label => {
                tracing::info!(label = %self.config.label, "fetching issues by label");
                self.issues
                    .list_issues_by_label(&self.config.owner, &self.config.repo, &self.config.label)
                    .await
            }
            SourceType::Project => {
                let project = self.project.as_ref().ok_or_else(|| {
                    DispatchError::config("project source selected but no project client configured")
                })?;
                // Validation failure is fatal to the whole run.
                project.validate().await?;
                tracing::info!(status = %self.config.ready_status, "fetching project items");
                let mut items = project
                    .fetch_items_by_status(&self.config.ready_status)
                    .await?;
                for issue in &mut items {
                    if let Some(priority) = &issue.project_priority {
                        issue.labels.push(format!("priority:{priority}"));
                    }
                }
                Ok(items)
            }
        }
    }

    /// Query the sub-issues edge for every issue still missing it.
    /// Returns the state cache keyed by DAG id.
    pub async fn populate_sub_issues(
        &self,
        issues: &mut [QueuedIssue],
    ) -> HashMap<String, IssueState> {
        let mut states = HashMap::new();
        for issue in issues.iter_mut() {
            if issue.sub_issue_numbers.is_some() {
                continue;
            }
            match self
                .issues
                .fetch_sub_issues(&issue.owner, &issue.repo, issue.number)
                .await
            {
                Ok(subs) => {
                    let numbers: Vec<u64> = subs.iter().map(|s| s.number).collect();
                    for sub in subs {
                        states.insert(
                            format!("{}/{}#{}", issue.owner, issue.repo, sub.number),
                            sub.state,
                        );
                    }
                    issue.sub_issue_numbers = Some(numbers);
                }
                Err(e) => {
                    // Soft failure: the sub-issues edge is optional.
                    tracing::warn!(
                        issue = issue.number,
                        error = %e,
                        "sub-issue query failed, treating as no sub-issues"
                    );
                    issue.sub_issue_numbers = Some(Vec::new());
                }
            }
        }
        states
    }

    /// Run the full pipeline and produce the matrix.
    pub async fn run(&self) -> Result<DispatchOutcome, DispatchError> {
        let mut fetched = self.fetch().await?;
        let total_fetched = fetched.len();
        tracing::info!(count = total_fetched, "fetched queue issues");

        let states = self.populate_sub_issues(&mut fetched).await;
        let resolved = resolve_issues(fetched, &states);
        let graph = build_dag(resolved);
        let cycles = detect_cycles(&graph);
        for cycle in &cycles {
            tracing::warn!(cycle = %cycle.description, "dependency cycle detected");
        }

        let (ready, blocked) = partition(&graph, &cycles);
        let matrix = build_matrix(&ready, self.config.effective_max_concurrent());
        tracing::info!(
            ready = ready.len(),
            blocked = blocked.len(),
            dispatched = matrix.include.len(),
            "dispatch plan computed"
        );

        Ok(DispatchOutcome {
            matrix,
            cycles,
            blocked_ids: blocked.iter().map(|r| r.dag_id()).collect(),
            total_fetched,
        })
    }
}
