//! Typed access to the issue-processor context
//!
//! The engine context is a dynamic map; this module pins down the keys
//! the issue-processor workflow uses plus the [`Task`] shape the planner
//! produces, with tolerant accessors for the eval transforms.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use flowgraph_core::WorkflowState;

/// Context keys used by the issue-processor workflow.
pub mod keys {
    pub const ISSUE_NUMBER: &str = "issueNumber";
    pub const ISSUE_TITLE: &str = "issueTitle";
    pub const ISSUE_BODY: &str = "issueBody";
    pub const REPOSITORY: &str = "repository";
    pub const BASE_BRANCH: &str = "baseBranch";
    pub const ANALYSIS_RESULT: &str = "analysisResult";
    pub const TASKS: &str = "tasks";
    pub const CURRENT_TASK_INDEX: &str = "currentTaskIndex";
    pub const BRANCH_NAME: &str = "branchName";
    pub const PR_NUMBER: &str = "prNumber";
    pub const PR_URL: &str = "prUrl";
    pub const COMPLETED_NODES: &str = "completedNodes";
    pub const FAILED_NODES: &str = "failedNodes";
    pub const TESTS_PASSED: &str = "testsPassed";
    pub const ALL_TASKS_COMPLETE: &str = "allTasksComplete";
    pub const FIX_ATTEMPTS: &str = "fixAttempts";
    pub const MAX_FIX_ATTEMPTS: &str = "maxFixAttempts";
    pub const PR_BODY_MARKDOWN: &str = "prBodyMarkdown";
    pub const ACTIONS_RUN_URL: &str = "actionsRunUrl";
    pub const PROJECT_OWNER: &str = "projectOwner";
    pub const PROJECT_NUMBER: &str = "projectNumber";
    pub const DONE_STATUS: &str = "doneStatus";
    pub const RUN_ID: &str = "__runId";
}

/// Estimated size of one planned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Small,
    Medium,
    Large,
}

/// One unit of work produced by the planning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub description: String,
    pub complexity: Complexity,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub completed: bool,
}

/// The planned task list, empty when absent or malformed.
pub fn tasks(state: &WorkflowState) -> Vec<Task> {
    state
        .get(keys::TASKS)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

pub fn current_task_index(state: &WorkflowState) -> usize {
    state.get_i64(keys::CURRENT_TASK_INDEX).unwrap_or(0).max(0) as usize
}

pub fn current_task(state: &WorkflowState) -> Option<Task> {
    tasks(state).into_iter().nth(current_task_index(state))
}

pub fn fix_attempts(state: &WorkflowState) -> u32 {
    state.get_i64(keys::FIX_ATTEMPTS).unwrap_or(0).max(0) as u32
}

pub fn max_fix_attempts(state: &WorkflowState) -> u32 {
    state
        .get_i64(keys::MAX_FIX_ATTEMPTS)
        .filter(|&n| n > 0)
        .unwrap_or(3) as u32
}

/// A context value as a string list, empty when absent.
pub fn string_list(state: &WorkflowState, key: &str) -> Vec<String> {
    state
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Append names to a list, skipping ones already present. Keeps
/// `completedNodes` append-only with no duplicates.
pub fn append_unique(list: &mut Vec<String>, names: &[&str]) {
    for name in names {
        if !list.iter().any(|existing| existing == name) {
            list.push(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_wire_shape() {
        let task: Task = serde_json::from_value(json!({
            "id": "t1",
            "description": "wire the parser",
            "complexity": "small"
        }))
        .unwrap();
        assert_eq!(task.complexity, Complexity::Small);
        assert!(!task.completed);
        assert!(task.dependencies.is_empty());
    }

    #[test]
    fn test_tasks_tolerates_malformed_value() {
        let mut state = WorkflowState::new("A");
        state.context.insert(keys::TASKS.into(), json!("not a list"));
        assert!(tasks(&state).is_empty());
    }

    #[test]
    fn test_current_task_by_index() {
        let mut state = WorkflowState::new("A");
        state.context.insert(
            keys::TASKS.into(),
            json!([
                {"id": "t1", "description": "a", "complexity": "small"},
                {"id": "t2", "description": "b", "complexity": "large"}
            ]),
        );
        state.context.insert(keys::CURRENT_TASK_INDEX.into(), json!(1));
        assert_eq!(current_task(&state).unwrap().id, "t2");
    }

    #[test]
    fn test_append_unique_is_append_only() {
        let mut list = vec!["ANALYZE".to_string()];
        append_unique(&mut list, &["PLAN", "ANALYZE", "PLAN"]);
        assert_eq!(list, vec!["ANALYZE", "PLAN"]);
    }

    #[test]
    fn test_max_fix_attempts_default() {
        let state = WorkflowState::new("A");
        assert_eq!(max_fix_attempts(&state), 3);

        let mut state = WorkflowState::new("A");
        state.context.insert(keys::MAX_FIX_ATTEMPTS.into(), json!(5));
        assert_eq!(max_fix_attempts(&state), 5);
    }
}
