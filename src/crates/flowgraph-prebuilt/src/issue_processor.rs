//! The issue-processor workflow
//!
//! Drives one tracker issue end to end:
//!
//! ```text
//! ANALYZE → PLAN → CREATE_PR → PARSE_PR → EXPLORE
//!     → ┌──────────────── per-task loop ────────────────┐
//!       │ IMPLEMENT → TEST → SET_TEST_RESULT            │
//!       │   → GEN_PR_STATUS → WRITE_PR_STATUS           │
//!       │       ├─ tests passed ──► NEXT_TASK ──┐       │
//!       │       └─ failed ─► INCREMENT_RETRY ───┤       │
//!       │            (≤ maxFixAttempts) ──► IMPLEMENT   │
//!       └───────────────────────────────────────────────┘
//!     → GEN_FINAL_PR → WRITE_FINAL_PR → SET_DONE_STATUS → REPORT → END
//! ```
//!
//! Retry discipline: at most `maxFixAttempts` (default 3) implement/test
//! round-trips per task; exhaustion advances to the next task rather than
//! failing the run - the PR dashboard keeps the red TEST state visible.
//! `fixAttempts` resets on task advancement; `testsPassed` resets only
//! when another task follows.
//!
//! The PR-body shell steps default to `git`/`gh` invocations; every one
//! can be overridden through [`CommandOverrides`], which is also how the
//! scenario tests drive the loop hermetically.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use flowgraph_core::{Transition, WorkflowConfig, WorkflowState};
use flowgraph_dispatch::nodes::ProjectStatusNode;
use flowgraph_dispatch::ProjectClient;
use flowgraph_nodes::command::CommandSpec;
use flowgraph_nodes::provider::AgentProvider;
use flowgraph_nodes::result::keys as result_keys;
use flowgraph_nodes::{AgentNode, CommandNode, DynamicAgentNode, DynamicCommandNode, EvalNode};

use crate::context::{
    append_unique, current_task, current_task_index, fix_attempts, keys, max_fix_attempts,
    string_list, tasks,
};
use crate::dashboard::{
    render_dashboard, upsert_dashboard, DashboardSpec, DiagramSpec, UpsertPosition,
};

/// Node names of the issue-processor FSM.
pub mod node_names {
    pub const ANALYZE: &str = "ANALYZE";
    pub const PLAN: &str = "PLAN";
    pub const CREATE_PR: &str = "CREATE_PR";
    pub const PARSE_PR: &str = "PARSE_PR";
    pub const EXPLORE: &str = "EXPLORE";
    pub const IMPLEMENT: &str = "IMPLEMENT";
    pub const TEST: &str = "TEST";
    pub const SET_TEST_RESULT: &str = "SET_TEST_RESULT";
    pub const GEN_PR_STATUS: &str = "GEN_PR_STATUS";
    pub const WRITE_PR_STATUS: &str = "WRITE_PR_STATUS";
    pub const INCREMENT_RETRY: &str = "INCREMENT_RETRY";
    pub const NEXT_TASK: &str = "NEXT_TASK";
    pub const GEN_FINAL_PR: &str = "GEN_FINAL_PR";
    pub const WRITE_FINAL_PR: &str = "WRITE_FINAL_PR";
    pub const SET_DONE_STATUS: &str = "SET_DONE_STATUS";
    pub const REPORT: &str = "REPORT";
}

use node_names::*;

/// Shell-step overrides; `None` uses the default `git`/`gh` command.
#[derive(Debug, Clone, Default)]
pub struct CommandOverrides {
    pub create_pr: Option<String>,
    pub explore: Option<String>,
    pub test: Option<String>,
    pub write_pr_status: Option<String>,
    pub write_final_pr: Option<String>,
    pub report: Option<String>,
}

/// Issue-processor parameters
#[derive(Debug, Clone)]
pub struct IssueProcessorOptions {
    /// `owner/repo`.
    pub repository: String,
    pub issue_number: u64,
    pub issue_title: String,
    pub issue_body: String,
    pub base_branch: String,
    pub max_fix_attempts: u32,
    pub test_command: String,
    pub done_status: String,
    pub actions_run_url: Option<String>,
    pub project_owner: Option<String>,
    pub project_number: Option<u64>,
    pub commands: CommandOverrides,
}

impl IssueProcessorOptions {
    pub fn new(repository: impl Into<String>, issue_number: u64) -> Self {
        Self {
            repository: repository.into(),
            issue_number,
            issue_title: String::new(),
            issue_body: String::new(),
            base_branch: "main".to_string(),
            max_fix_attempts: 3,
            test_command: "npm test".to_string(),
            done_status: "Done".to_string(),
            actions_run_url: None,
            project_owner: None,
            project_number: None,
            commands: CommandOverrides::default(),
        }
    }
}

/// Collaborators injected into the workflow.
pub struct IssueProcessorDeps {
    pub agent: Arc<dyn AgentProvider>,
    pub project: Option<Arc<dyn ProjectClient>>,
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// The FSM shape handed to the dashboard renderer.
fn processor_diagram(active: &str) -> DiagramSpec {
    let nodes: Vec<String> = [
        ANALYZE, PLAN, CREATE_PR, PARSE_PR, EXPLORE, IMPLEMENT, TEST, SET_TEST_RESULT,
        GEN_PR_STATUS, WRITE_PR_STATUS, INCREMENT_RETRY, NEXT_TASK, GEN_FINAL_PR, WRITE_FINAL_PR,
        SET_DONE_STATUS, REPORT,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let edges: Vec<(String, String)> = [
        (ANALYZE, PLAN),
        (PLAN, CREATE_PR),
        (CREATE_PR, PARSE_PR),
        (PARSE_PR, EXPLORE),
        (EXPLORE, IMPLEMENT),
        (IMPLEMENT, TEST),
        (TEST, SET_TEST_RESULT),
        (SET_TEST_RESULT, GEN_PR_STATUS),
        (GEN_PR_STATUS, WRITE_PR_STATUS),
        (WRITE_PR_STATUS, NEXT_TASK),
        (WRITE_PR_STATUS, INCREMENT_RETRY),
        (INCREMENT_RETRY, IMPLEMENT),
        (INCREMENT_RETRY, NEXT_TASK),
        (NEXT_TASK, IMPLEMENT),
        (NEXT_TASK, GEN_FINAL_PR),
        (GEN_FINAL_PR, WRITE_FINAL_PR),
        (WRITE_FINAL_PR, SET_DONE_STATUS),
        (SET_DONE_STATUS, REPORT),
        (REPORT, "END"),
    ]
    .iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect();

    DiagramSpec {
        nodes,
        edges,
        active: active.to_string(),
        direction: "LR".to_string(),
    }
}

fn visited_sets(state: &WorkflowState) -> (HashSet<String>, HashSet<String>) {
    (
        string_list(state, keys::COMPLETED_NODES).into_iter().collect(),
        string_list(state, keys::FAILED_NODES).into_iter().collect(),
    )
}

fn compose_dashboard(state: &WorkflowState, active: &str, task_label: String) -> String {
    let run_id = state.get_str(keys::RUN_ID).unwrap_or("run").to_string();
    let (completed, failed) = visited_sets(state);
    let spec = DashboardSpec {
        marker_id: run_id.clone(),
        title: format!(
            "Workflow status for issue #{}",
            state.get_i64(keys::ISSUE_NUMBER).unwrap_or(0)
        ),
        current_task: task_label,
        retry_attempt: Some(fix_attempts(state) + 1),
        max_retries: Some(max_fix_attempts(state)),
        actions_run_url: state.get_str(keys::ACTIONS_RUN_URL).map(String::from),
    };
    let block = render_dashboard(&spec, &processor_diagram(active), &completed, &failed);
    let previous = state.get_str(keys::PR_BODY_MARKDOWN).unwrap_or("");
    upsert_dashboard(previous, &block, &run_id, UpsertPosition::Bottom)
}

fn pr_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"PR_NUMBER:\s*(\d+)").expect("static pattern"))
}

fn pr_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"PR_URL:\s*(\S+)").expect("static pattern"))
}

fn branch_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"BRANCH_NAME:\s*(\S+)").expect("static pattern"))
}

fn pull_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/pull/(\d+)").expect("static pattern"))
}

/// Build the issue-processor [`WorkflowConfig`].
pub fn issue_processor(
    options: IssueProcessorOptions,
    deps: IssueProcessorDeps,
) -> WorkflowConfig {
    let mut initial = Map::new();
    initial.insert(keys::ISSUE_NUMBER.into(), json!(options.issue_number));
    initial.insert(keys::ISSUE_TITLE.into(), json!(options.issue_title));
    initial.insert(keys::ISSUE_BODY.into(), json!(options.issue_body));
    initial.insert(keys::REPOSITORY.into(), json!(options.repository));
    initial.insert(keys::BASE_BRANCH.into(), json!(options.base_branch));
    initial.insert(keys::CURRENT_TASK_INDEX.into(), json!(0));
    initial.insert(keys::COMPLETED_NODES.into(), json!([]));
    initial.insert(keys::FAILED_NODES.into(), json!([]));
    initial.insert(keys::TESTS_PASSED.into(), json!(false));
    initial.insert(keys::ALL_TASKS_COMPLETE.into(), json!(false));
    initial.insert(keys::FIX_ATTEMPTS.into(), json!(0));
    initial.insert(keys::MAX_FIX_ATTEMPTS.into(), json!(options.max_fix_attempts));
    if let Some(url) = &options.actions_run_url {
        initial.insert(keys::ACTIONS_RUN_URL.into(), json!(url));
    }
    if let Some(owner) = &options.project_owner {
        initial.insert(keys::PROJECT_OWNER.into(), json!(owner));
    }
    if let Some(number) = options.project_number {
        initial.insert(keys::PROJECT_NUMBER.into(), json!(number));
    }

    let analyze = AgentNode::new(
        ANALYZE,
        "analyst",
        "You analyze tracker issues and produce a concise implementation assessment.",
        "Analyze issue #{{issueNumber}} ({{issueTitle}}) in {{repository}}.\n\n{{issueBody}}",
        Arc::clone(&deps.agent),
        Transition::to(PLAN),
    )
    .with_output_key(keys::ANALYSIS_RESULT);

    let plan = AgentNode::new(
        PLAN,
        "planner",
        "You break an analyzed issue into ordered implementation tasks. Respond with a \
         JSON array of tasks, each {\"id\", \"description\", \"complexity\": \
         \"small|medium|large\", \"dependencies\": [], \"files\": []}.",
        "Plan the implementation for issue #{{issueNumber}}.\n\nAnalysis:\n{{analysisResult}}",
        Arc::clone(&deps.agent),
        Transition::to(CREATE_PR),
    )
    .with_output_key(keys::TASKS)
    .with_json_output();

    let create_pr = {
        let override_cmd = options.commands.create_pr.clone();
        let repository = options.repository.clone();
        let base_branch = options.base_branch.clone();
        let issue_number = options.issue_number;
        let issue_title = options.issue_title.clone();
        DynamicCommandNode::new(CREATE_PR, Transition::to(PARSE_PR), move |_state| {
            if let Some(cmd) = &override_cmd {
                return Ok(CommandSpec::Shell(cmd.clone()));
            }
            let branch = format!("flowgraph/issue-{issue_number}");
            let title = shell_quote(&format!("[WIP] #{issue_number}: {issue_title}"));
            let body = shell_quote(&format!("Automated pull request for issue #{issue_number}."));
            Ok(CommandSpec::Shell(format!(
                "git checkout -b {branch} && git push -u origin {branch} && \
                 gh pr create --draft --repo {repository} --base {base_branch} \
                 --head {branch} --title {title} --body {body} && \
                 echo BRANCH_NAME: {branch} && \
                 gh pr view {branch} --repo {repository} --json number,url \
                 --jq '\"PR_NUMBER: \" + (.number|tostring) + \"\\nPR_URL: \" + .url'"
            )))
        })
    };

    let parse_pr = EvalNode::new(PARSE_PR, Transition::to(EXPLORE), |state| {
        let stdout = state
            .get(result_keys::LAST_DYNAMIC_COMMAND_RESULT)
            .and_then(|v| v.get("stdout"))
            .and_then(Value::as_str)
            .unwrap_or("");

        let pr_url = pr_url_regex()
            .captures(stdout)
            .map(|c| c[1].to_string());
        let pr_number = pr_number_regex()
            .captures(stdout)
            .map(|c| c[1].to_string())
            .or_else(|| {
                pr_url
                    .as_deref()
                    .and_then(|url| pull_url_regex().captures(url).map(|c| c[1].to_string()))
            })
            .and_then(|n| n.parse::<u64>().ok())
            .ok_or_else(|| format!("no PR number in create-PR output: {stdout:?}"))?;

        let mut patch = Map::new();
        patch.insert(keys::PR_NUMBER.into(), json!(pr_number));
        if let Some(url) = pr_url {
            patch.insert(keys::PR_URL.into(), json!(url));
        }
        if let Some(captures) = branch_regex().captures(stdout) {
            patch.insert(keys::BRANCH_NAME.into(), json!(captures[1].to_string()));
        }

        let mut visited = string_list(state, keys::COMPLETED_NODES);
        append_unique(&mut visited, &[ANALYZE, PLAN, CREATE_PR, PARSE_PR]);
        patch.insert(keys::COMPLETED_NODES.into(), json!(visited));
        Ok(patch)
    });

    let explore = CommandNode::new(
        EXPLORE,
        options
            .commands
            .explore
            .clone()
            .unwrap_or_else(|| "find . -maxdepth 2 -not -path './.git*'".to_string()),
        Transition::to(IMPLEMENT),
    )
    .with_throw_on_error(false);

    let implement = DynamicAgentNode::new(
        IMPLEMENT,
        Transition::to(TEST),
        Arc::clone(&deps.agent),
        |state: &WorkflowState| {
            let attempt = fix_attempts(state) + 1;
            let max = max_fix_attempts(state);
            match current_task(state) {
                Some(task) => format!(
                    "Implement task {} ({:?}): {}\nRelevant files: {}\nAttempt {attempt} of {max}.",
                    task.id,
                    task.complexity,
                    task.description,
                    task.files.join(", "),
                ),
                None => "No task is selected; make no changes.".to_string(),
            }
        },
    )
    .with_role("implementer")
    .with_system(|_| {
        "You implement one task at a time in the checked-out repository, \
         keeping changes minimal and focused."
            .to_string()
    });

    let test = CommandNode::new(
        TEST,
        options
            .commands
            .test
            .clone()
            .unwrap_or_else(|| options.test_command.clone()),
        Transition::to(SET_TEST_RESULT),
    )
    .with_throw_on_error(false);

    let set_test_result = EvalNode::new(SET_TEST_RESULT, Transition::to(GEN_PR_STATUS), |state| {
        let passed = state
            .get(result_keys::LAST_COMMAND_RESULT)
            .and_then(|v| v.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut completed = string_list(state, keys::COMPLETED_NODES);
        let mut failed = string_list(state, keys::FAILED_NODES);
        append_unique(&mut completed, &[EXPLORE, IMPLEMENT, SET_TEST_RESULT]);
        if passed {
            append_unique(&mut completed, &[TEST]);
            failed.retain(|name| name != TEST);
        } else {
            append_unique(&mut failed, &[TEST]);
        }

        let mut patch = Map::new();
        patch.insert(keys::TESTS_PASSED.into(), json!(passed));
        patch.insert(keys::COMPLETED_NODES.into(), json!(completed));
        patch.insert(keys::FAILED_NODES.into(), json!(failed));
        Ok(patch)
    });

    let gen_pr_status = EvalNode::new(GEN_PR_STATUS, Transition::to(WRITE_PR_STATUS), |state| {
        let task_label = current_task(state)
            .map(|t| format!("{}: {}", t.id, t.description))
            .unwrap_or_else(|| "-".to_string());
        let body = compose_dashboard(state, GEN_PR_STATUS, task_label);

        let mut completed = string_list(state, keys::COMPLETED_NODES);
        append_unique(&mut completed, &[GEN_PR_STATUS]);

        let mut patch = Map::new();
        patch.insert(keys::PR_BODY_MARKDOWN.into(), json!(body));
        patch.insert(keys::COMPLETED_NODES.into(), json!(completed));
        Ok(patch)
    });

    let write_pr_status = {
        let override_cmd = options.commands.write_pr_status.clone();
        let repository = options.repository.clone();
        DynamicCommandNode::new(
            WRITE_PR_STATUS,
            Transition::when(|state: &WorkflowState| {
                if state.get_bool(keys::TESTS_PASSED).unwrap_or(false) {
                    NEXT_TASK.to_string()
                } else {
                    INCREMENT_RETRY.to_string()
                }
            }),
            move |state| {
                if let Some(cmd) = &override_cmd {
                    return Ok(CommandSpec::Shell(cmd.clone()));
                }
                let pr_number = state
                    .get_i64(keys::PR_NUMBER)
                    .ok_or_else(|| "prNumber missing from context".to_string())?;
                let body = state
                    .get_str(keys::PR_BODY_MARKDOWN)
                    .ok_or_else(|| "prBodyMarkdown missing from context".to_string())?;
                Ok(CommandSpec::Argv(vec![
                    "gh".into(),
                    "api".into(),
                    format!("repos/{repository}/pulls/{pr_number}"),
                    "-X".into(),
                    "PATCH".into(),
                    "-f".into(),
                    format!("body={body}"),
                ]))
            },
        )
    };

    let increment_retry = EvalNode::new(
        INCREMENT_RETRY,
        Transition::when(|state: &WorkflowState| {
            if fix_attempts(state) < max_fix_attempts(state) {
                IMPLEMENT.to_string()
            } else {
                NEXT_TASK.to_string()
            }
        }),
        |state| {
            let mut completed = string_list(state, keys::COMPLETED_NODES);
            append_unique(&mut completed, &[WRITE_PR_STATUS, INCREMENT_RETRY]);

            let mut patch = Map::new();
            patch.insert(keys::FIX_ATTEMPTS.into(), json!(fix_attempts(state) + 1));
            patch.insert(keys::COMPLETED_NODES.into(), json!(completed));
            Ok(patch)
        },
    );

    let next_task = EvalNode::new(
        NEXT_TASK,
        Transition::when(|state: &WorkflowState| {
            if state.get_bool(keys::ALL_TASKS_COMPLETE).unwrap_or(false) {
                GEN_FINAL_PR.to_string()
            } else {
                IMPLEMENT.to_string()
            }
        }),
        |state| {
            let mut task_list = tasks(state);
            let index = current_task_index(state);
            if let Some(task) = task_list.get_mut(index) {
                // Marked done even when fix attempts ran out; the PR
                // dashboard carries the red test state.
                task.completed = true;
            }
            let more = index + 1 < task_list.len();

            let mut completed = string_list(state, keys::COMPLETED_NODES);
            append_unique(&mut completed, &[WRITE_PR_STATUS, NEXT_TASK]);

            let mut patch = Map::new();
            patch.insert(keys::TASKS.into(), serde_json::to_value(&task_list).map_err(|e| e.to_string())?);
            patch.insert(keys::FIX_ATTEMPTS.into(), json!(0));
            patch.insert(keys::COMPLETED_NODES.into(), json!(completed));
            if more {
                patch.insert(keys::CURRENT_TASK_INDEX.into(), json!(index + 1));
                patch.insert(keys::TESTS_PASSED.into(), json!(false));
            } else {
                patch.insert(keys::ALL_TASKS_COMPLETE.into(), json!(true));
            }
            Ok(patch)
        },
    );

    let gen_final_pr = EvalNode::new(GEN_FINAL_PR, Transition::to(WRITE_FINAL_PR), |state| {
        let task_list = tasks(state);
        let done = task_list.iter().filter(|t| t.completed).count();
        let body = compose_dashboard(
            state,
            GEN_FINAL_PR,
            format!("{done}/{} tasks complete", task_list.len()),
        );

        let mut completed = string_list(state, keys::COMPLETED_NODES);
        append_unique(&mut completed, &[GEN_FINAL_PR]);

        let mut patch = Map::new();
        patch.insert(keys::PR_BODY_MARKDOWN.into(), json!(body));
        patch.insert(keys::COMPLETED_NODES.into(), json!(completed));
        Ok(patch)
    });

    let write_final_pr = {
        let override_cmd = options.commands.write_final_pr.clone();
        let repository = options.repository.clone();
        DynamicCommandNode::new(
            WRITE_FINAL_PR,
            Transition::to(SET_DONE_STATUS),
            move |state| {
                if let Some(cmd) = &override_cmd {
                    return Ok(CommandSpec::Shell(cmd.clone()));
                }
                let pr_number = state
                    .get_i64(keys::PR_NUMBER)
                    .ok_or_else(|| "prNumber missing from context".to_string())?;
                let body = state
                    .get_str(keys::PR_BODY_MARKDOWN)
                    .ok_or_else(|| "prBodyMarkdown missing from context".to_string())?;
                Ok(CommandSpec::Shell(format!(
                    "gh api repos/{repository}/pulls/{pr_number} -X PATCH -f body={} && \
                     gh pr ready {pr_number} --repo {repository}",
                    shell_quote(body)
                )))
            },
        )
    };

    // Placeholder noop; the real tracker runtime is selected when
    // project configuration is present.
    let set_done_status: Arc<dyn flowgraph_core::NodeRuntime> = match (
        &options.project_owner,
        options.project_number,
        deps.project.clone(),
    ) {
        (Some(_), Some(_), Some(project)) => Arc::new(ProjectStatusNode::new(
            SET_DONE_STATUS,
            project,
            options.done_status.clone(),
            Transition::to(REPORT),
        )),
        _ => Arc::new(EvalNode::noop(SET_DONE_STATUS, Transition::to(REPORT))),
    };

    let report = {
        let override_cmd = options.commands.report.clone();
        let repository = options.repository.clone();
        let issue_number = options.issue_number;
        DynamicCommandNode::new(REPORT, Transition::end(), move |state| {
            if let Some(cmd) = &override_cmd {
                return Ok(CommandSpec::Shell(cmd.clone()));
            }
            let pr_url = state.get_str(keys::PR_URL).unwrap_or("(no PR)");
            let passed = state.get_bool(keys::TESTS_PASSED).unwrap_or(false);
            let body = format!(
                "Workflow finished for issue #{issue_number}. Pull request: {pr_url}. \
                 Final test status: {}.",
                if passed { "passing" } else { "failing" }
            );
            Ok(CommandSpec::Argv(vec![
                "gh".into(),
                "issue".into(),
                "comment".into(),
                issue_number.to_string(),
                "--repo".into(),
                repository.clone(),
                "--body".into(),
                body,
            ]))
        })
    };

    WorkflowConfig::new(format!("issue-processor-{}", options.issue_number))
        .with_initial_context(initial)
        .with_node(Arc::new(analyze))
        .with_node(Arc::new(plan))
        .with_node(Arc::new(create_pr))
        .with_node(Arc::new(parse_pr))
        .with_node(Arc::new(explore))
        .with_node(Arc::new(implement))
        .with_node(Arc::new(test))
        .with_node(Arc::new(set_test_result))
        .with_node(Arc::new(gen_pr_status))
        .with_node(Arc::new(write_pr_status))
        .with_node(Arc::new(increment_retry))
        .with_node(Arc::new(next_task))
        .with_node(Arc::new(gen_final_pr))
        .with_node(Arc::new(write_final_pr))
        .with_node(set_done_status)
        .with_node(Arc::new(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_nodes::provider::{AgentRequest, AgentResponse};

    struct NullAgent;

    #[async_trait::async_trait]
    impl AgentProvider for NullAgent {
        async fn run(
            &self,
            _request: &AgentRequest,
        ) -> flowgraph_core::Result<AgentResponse> {
            Ok(AgentResponse {
                success: true,
                output: String::new(),
                error: None,
                usage: None,
                files_affected: vec![],
            })
        }
    }

    fn build(options: IssueProcessorOptions) -> WorkflowConfig {
        issue_processor(
            options,
            IssueProcessorDeps {
                agent: Arc::new(NullAgent),
                project: None,
            },
        )
    }

    #[test]
    fn test_workflow_validates() {
        let config = build(IssueProcessorOptions::new("octo/hello", 7));
        let report = config.validate().unwrap();
        // Dynamic transitions suppress the static reachability walk.
        assert!(!report.reachability_checked);
        assert_eq!(config.entry(), Some(ANALYZE));
        assert_eq!(config.nodes.len(), 16);
    }

    #[test]
    fn test_initial_context_defaults() {
        let config = build(IssueProcessorOptions::new("octo/hello", 7));
        assert_eq!(config.initial_context[keys::MAX_FIX_ATTEMPTS], json!(3));
        assert_eq!(config.initial_context[keys::FIX_ATTEMPTS], json!(0));
        assert_eq!(config.initial_context[keys::BASE_BRANCH], json!("main"));
        assert_eq!(config.initial_context[keys::TESTS_PASSED], json!(false));
    }

    #[test]
    fn test_shell_quote_handles_single_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_diagram_covers_all_nodes() {
        let diagram = processor_diagram(IMPLEMENT);
        assert_eq!(diagram.nodes.len(), 16);
        assert!(diagram.edges.iter().any(|(a, b)| a == REPORT && b == "END"));
    }
}
