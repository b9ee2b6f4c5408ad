//! Ready/blocked partition and matrix emission
//!
//! Ready = open leaf issues with nothing blocking them and no cycle
//! membership, sorted by priority score ascending (stable within equal
//! scores, preserving fetch order). Everything else is blocked. The
//! matrix takes up to `max_concurrent` entries - unbounded when the limit
//! is unset or non-positive - and is written as `{"include": [...]}` to
//! the output file, plus a `matrix=<compact-json>` line on
//! `GITHUB_OUTPUT` under GitHub Actions.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use crate::dag::DependencyGraph;
use crate::error::DispatchError;
use crate::types::{CycleInfo, DispatchMatrix, MatrixEntry, ResolutionStatus, ResolvedIssue};

/// Split the graph into dispatchable and held-back issues.
pub fn partition(
    graph: &DependencyGraph,
    cycles: &[CycleInfo],
) -> (Vec<ResolvedIssue>, Vec<ResolvedIssue>) {
    let cycle_members: HashSet<&str> = cycles
        .iter()
        .flat_map(|c| c.cycle_nodes.iter().map(String::as_str))
        .collect();

    let mut ready = Vec::new();
    let mut blocked = Vec::new();
    for node in graph.iter() {
        let issue = &node.issue;
        let eligible = issue.status == ResolutionStatus::Ready
            && issue.is_leaf
            && !cycle_members.contains(node.id.as_str());
        if eligible {
            ready.push(issue.clone());
        } else {
            blocked.push(issue.clone());
        }
    }

    // Stable: equal scores keep fetch order.
    ready.sort_by_key(|issue| issue.priority_score);
    (ready, blocked)
}

/// Map the ready set (already ordered) into the wire matrix.
pub fn build_matrix(ready: &[ResolvedIssue], max_concurrent: Option<usize>) -> DispatchMatrix {
    let bound = max_concurrent.unwrap_or(usize::MAX);
    let include = ready
        .iter()
        .take(bound)
        .map(|resolved| MatrixEntry {
            issue_number: resolved.issue.number,
            title: resolved.issue.title.clone(),
            priority: resolved.priority.as_str().to_string(),
            priority_score: resolved.priority_score,
            repository: resolved.issue.repository(),
            url: resolved.issue.url.clone(),
            parent_issue_number: resolved.issue.parent_issue_number,
        })
        .collect();
    DispatchMatrix { include }
}

/// Write the matrix artifact and the Actions output line.
///
/// `dry_run` logs the plan and writes nothing.
pub fn emit_matrix(
    matrix: &DispatchMatrix,
    output_file: Option<&Path>,
    dry_run: bool,
) -> Result<(), DispatchError> {
    let compact = serde_json::to_string(matrix)?;
    if dry_run {
        tracing::info!(matrix = %compact, "dry run, skipping matrix emission");
        return Ok(());
    }

    if let Some(path) = output_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(matrix)?)?;
        tracing::info!(path = %path.display(), "matrix written");
    }

    if std::env::var("GITHUB_ACTIONS").as_deref() == Ok("true") {
        if let Ok(output_path) = std::env::var("GITHUB_OUTPUT") {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(output_path)?;
            writeln!(file, "matrix={compact}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::build_dag;
    use crate::resolve::resolve_issues;
    use crate::types::{IssueState, QueuedIssue};
    use std::collections::HashMap;

    fn queued(number: u64, labels: &[&str]) -> QueuedIssue {
        QueuedIssue {
            number,
            title: format!("Issue {number}"),
            body: String::new(),
            state: IssueState::Open,
            labels: labels.iter().map(|s| s.to_string()).collect(),
            owner: "octo".into(),
            repo: "hello".into(),
            url: format!("https://github.com/octo/hello/issues/{number}"),
            sub_issue_numbers: Some(vec![]),
            parent_issue_number: None,
            project_priority: None,
        }
    }

    fn ready_set(issues: Vec<QueuedIssue>) -> Vec<ResolvedIssue> {
        let graph = build_dag(resolve_issues(issues, &HashMap::new()));
        partition(&graph, &[]).0
    }

    #[test]
    fn test_matrix_ordered_by_priority_score() {
        let ready = ready_set(vec![
            queued(1, &["priority:low"]),
            queued(2, &["priority:critical"]),
            queued(3, &["priority:high"]),
        ]);
        let matrix = build_matrix(&ready, None);
        let numbers: Vec<u64> = matrix.include.iter().map(|e| e.issue_number).collect();
        assert_eq!(numbers, vec![2, 3, 1]);

        let scores: Vec<u8> = matrix.include.iter().map(|e| e.priority_score).collect();
        let mut sorted = scores.clone();
        sorted.sort();
        assert_eq!(scores, sorted);
    }

    #[test]
    fn test_equal_scores_keep_fetch_order() {
        let ready = ready_set(vec![
            queued(5, &["priority:medium"]),
            queued(3, &["priority:medium"]),
            queued(9, &["priority:medium"]),
        ]);
        let matrix = build_matrix(&ready, None);
        let numbers: Vec<u64> = matrix.include.iter().map(|e| e.issue_number).collect();
        assert_eq!(numbers, vec![5, 3, 9]);
    }

    #[test]
    fn test_max_concurrent_truncates() {
        let ready = ready_set(vec![queued(1, &[]), queued(2, &[]), queued(3, &[])]);
        assert_eq!(build_matrix(&ready, Some(2)).include.len(), 2);
        assert_eq!(build_matrix(&ready, None).include.len(), 3);
    }

    #[test]
    fn test_cycle_members_held_back() {
        let mut a = queued(20, &[]);
        a.sub_issue_numbers = Some(vec![21]);
        let mut b = queued(21, &[]);
        b.sub_issue_numbers = Some(vec![20]);

        let mut states = HashMap::new();
        states.insert("octo/hello#20".to_string(), IssueState::Open);
        states.insert("octo/hello#21".to_string(), IssueState::Open);

        let graph = build_dag(resolve_issues(vec![a, b], &states));
        let cycles = crate::dag::detect_cycles(&graph);
        assert_eq!(cycles.len(), 1);

        let (ready, blocked) = partition(&graph, &cycles);
        assert!(ready.is_empty());
        assert_eq!(blocked.len(), 2);
    }

    #[test]
    fn test_non_leaf_never_dispatches() {
        let mut aggregator = queued(30, &["priority:critical"]);
        aggregator.sub_issue_numbers = Some(vec![31]);
        let leaf = queued(31, &[]);

        let mut states = HashMap::new();
        states.insert("octo/hello#31".to_string(), IssueState::Closed);

        let graph = build_dag(resolve_issues(vec![aggregator, leaf], &states));
        let (ready, _) = partition(&graph, &[]);
        // The aggregator is READY (sub-issue closed) but not a leaf.
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].issue.number, 31);
    }

    #[test]
    fn test_emit_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/matrix.json");
        let ready = ready_set(vec![queued(1, &[])]);
        let matrix = build_matrix(&ready, None);

        emit_matrix(&matrix, Some(&path), false).unwrap();
        let written: DispatchMatrix =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, matrix);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.json");
        let matrix = build_matrix(&[], None);
        emit_matrix(&matrix, Some(&path), true).unwrap();
        assert!(!path.exists());
    }
}
