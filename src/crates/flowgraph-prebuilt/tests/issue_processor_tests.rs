//! End-to-end scenarios for the issue-processor workflow, run against a
//! stub agent and hermetic shell commands.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use flowgraph_core::{
    EngineConfig, GraphEngine, Result, WorkflowState, WorkflowStatus, END,
};
use flowgraph_nodes::provider::{AgentProvider, AgentRequest, AgentResponse};
use flowgraph_prebuilt::{
    issue_processor, CommandOverrides, IssueProcessorDeps, IssueProcessorOptions, Task,
};
use flowgraph_store::MemoryStateStore;

/// Agent stub keyed on the requesting role: the analyst gets prose, the
/// planner gets a JSON task list, the implementer acknowledges.
struct ScriptedAgent {
    task_count: usize,
}

#[async_trait]
impl AgentProvider for ScriptedAgent {
    async fn run(&self, request: &AgentRequest) -> Result<AgentResponse> {
        let output = match request.role.as_str() {
            "analyst" => "A contained change to the parser module.".to_string(),
            "planner" => {
                let tasks: Vec<_> = (1..=self.task_count)
                    .map(|n| {
                        json!({
                            "id": format!("t{n}"),
                            "description": format!("step {n}"),
                            "complexity": "small",
                            "dependencies": [],
                            "files": [],
                        })
                    })
                    .collect();
                serde_json::to_string(&tasks).expect("serializable tasks")
            }
            _ => "implemented".to_string(),
        };
        Ok(AgentResponse {
            success: true,
            output,
            error: None,
            usage: None,
            files_affected: vec![],
        })
    }
}

const CREATE_PR_OUTPUT: &str =
    "printf 'BRANCH_NAME: flowgraph/issue-7\\nPR_NUMBER: 12\\nPR_URL: https://github.com/octo/hello/pull/12\\n'";

fn options(test_command: &str, task_count: usize) -> (IssueProcessorOptions, IssueProcessorDeps) {
    let mut options = IssueProcessorOptions::new("octo/hello", 7);
    options.issue_title = "Fix the parser".into();
    options.issue_body = "The parser mishandles empty input.".into();
    options.commands = CommandOverrides {
        create_pr: Some(CREATE_PR_OUTPUT.into()),
        explore: Some("echo src".into()),
        test: Some(test_command.into()),
        write_pr_status: Some("true".into()),
        write_final_pr: Some("true".into()),
        report: Some("echo reported".into()),
    };
    let deps = IssueProcessorDeps {
        agent: Arc::new(ScriptedAgent { task_count }),
        project: None,
    };
    (options, deps)
}

async fn run(options: IssueProcessorOptions, deps: IssueProcessorDeps) -> WorkflowState {
    let store = Arc::new(MemoryStateStore::new());
    let engine = GraphEngine::new(
        issue_processor(options, deps),
        store,
        EngineConfig::default(),
    )
    .unwrap();
    engine.run("scenario-run").await.unwrap()
}

fn tasks_of(state: &WorkflowState) -> Vec<Task> {
    serde_json::from_value(state.get("tasks").cloned().unwrap()).unwrap()
}

fn completed_nodes(state: &WorkflowState) -> Vec<String> {
    state
        .get("completedNodes")
        .and_then(|v| v.as_array())
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

/// A test command that fails until it has been invoked `passes_on` times.
fn flaky_test_command(dir: &std::path::Path, passes_on: u32) -> String {
    let counter = dir.join("attempts").to_string_lossy().to_string();
    format!(
        r#"n=$(cat {counter} 2>/dev/null || echo 0); n=$((n+1)); echo $n > {counter}; [ "$n" -ge {passes_on} ]"#
    )
}

fn attempts_recorded(dir: &std::path::Path) -> u32 {
    std::fs::read_to_string(dir.join("attempts"))
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_single_task_green_path() {
    // S1: one small task, tests pass first try.
    let (options, deps) = options("true", 1);
    let state = run(options, deps).await;

    assert_eq!(state.current_node, END);
    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(state.get("testsPassed"), Some(&json!(true)));
    assert_eq!(state.get("allTasksComplete"), Some(&json!(true)));
    assert_eq!(state.get("fixAttempts"), Some(&json!(0)));
    assert_eq!(state.get("currentTaskIndex"), Some(&json!(0)));

    let tasks = tasks_of(&state);
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].completed);

    // PR metadata parsed out of the create-PR output.
    assert_eq!(state.get("prNumber"), Some(&json!(12)));
    assert_eq!(
        state.get("prUrl"),
        Some(&json!("https://github.com/octo/hello/pull/12"))
    );
    assert_eq!(state.get("branchName"), Some(&json!("flowgraph/issue-7")));

    // The full green path was visited, in order.
    let visited = completed_nodes(&state);
    let expected_prefix = [
        "ANALYZE",
        "PLAN",
        "CREATE_PR",
        "PARSE_PR",
        "EXPLORE",
        "IMPLEMENT",
        "SET_TEST_RESULT",
        "TEST",
    ];
    assert_eq!(&visited[..expected_prefix.len()], &expected_prefix);
    assert!(visited.contains(&"NEXT_TASK".to_string()));
    assert!(visited.contains(&"GEN_FINAL_PR".to_string()));

    // Dashboard upserted into the PR body under the run-keyed marker.
    let body = state.get("prBodyMarkdown").unwrap().as_str().unwrap();
    assert!(body.contains("<!-- foundry-workflow-dashboard:scenario-run -->"));
    assert!(body.contains("stateDiagram-v2"));
    assert!(body.matches("stateDiagram-v2").count() == 1, "upsert must replace, not append");
}

#[tokio::test]
async fn test_flaky_task_recovers_within_budget() {
    // S2: tests fail twice, pass on the third try.
    let dir = tempfile::tempdir().unwrap();
    let (options, deps) = options(&flaky_test_command(dir.path(), 3), 1);
    let state = run(options, deps).await;

    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(attempts_recorded(dir.path()), 3);
    assert_eq!(state.get("testsPassed"), Some(&json!(true)));
    // fixAttempts reached 2 entering NEXT_TASK, then reset.
    assert_eq!(state.get("fixAttempts"), Some(&json!(0)));
    assert!(tasks_of(&state)[0].completed);
    assert!(completed_nodes(&state).contains(&"INCREMENT_RETRY".to_string()));
}

#[tokio::test]
async fn test_exhausted_retries_advance_not_fail() {
    // S3: tests never pass; after maxFixAttempts cycles the task is
    // marked done and the workflow completes with the red state visible.
    let dir = tempfile::tempdir().unwrap();
    let (options, deps) = options(&flaky_test_command(dir.path(), 1000), 1);
    let state = run(options, deps).await;

    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(attempts_recorded(dir.path()), 3, "maxFixAttempts implement/test cycles");
    assert_eq!(state.get("testsPassed"), Some(&json!(false)));
    assert_eq!(state.get("allTasksComplete"), Some(&json!(true)));
    assert!(tasks_of(&state)[0].completed);

    // The final dashboard renders TEST as failed.
    let body = state.get("prBodyMarkdown").unwrap().as_str().unwrap();
    assert!(body.contains("class TEST failed"));
}

#[tokio::test]
async fn test_two_tasks_run_in_sequence() {
    let (options, deps) = options("true", 2);
    let state = run(options, deps).await;

    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(state.get("currentTaskIndex"), Some(&json!(1)));
    assert_eq!(state.get("allTasksComplete"), Some(&json!(true)));
    let tasks = tasks_of(&state);
    assert!(tasks.iter().all(|t| t.completed));
}

#[tokio::test]
async fn test_terminal_rerun_is_stable() {
    let store = Arc::new(MemoryStateStore::new());
    let (options, deps) = options("true", 1);
    let engine = GraphEngine::new(
        issue_processor(options, deps),
        store.clone(),
        EngineConfig::default(),
    )
    .unwrap();

    let final_state = engine.run("resume-run").await.unwrap();
    assert_eq!(final_state.status, WorkflowStatus::Completed);

    // Re-running the terminal run changes nothing.
    let again = engine.run("resume-run").await.unwrap();
    assert_eq!(again.current_node, final_state.current_node);
    assert_eq!(again.context, final_state.context);
}
