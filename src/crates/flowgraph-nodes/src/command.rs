//! Command nodes: child processes with enforced timeouts
//!
//! A command is either a shell string or an explicit argument vector.
//! Shell strings containing metacharacters run under `sh -c`; plain
//! strings are tokenized quote-aware and exec'd directly, bypassing the
//! shell. Each invocation enforces its own timeout and guarantees the
//! child is killed on timeout or cancellation (`kill_on_drop`).
//!
//! stdout/stderr are captured trimmed along with the exit code; the
//! outcome is recorded under the node's result key. With
//! `throw_on_error=false` a non-zero exit (or timeout) is recorded rather
//! than thrown - probe commands like test runs rely on this.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use flowgraph_core::{
    EngineContext, EngineError, NodeKind, NodeOutcome, NodeRuntime, Result, StateDelta, Transition,
    WorkflowState,
};

use crate::result::{keys, CommandResult};
use crate::shell::{needs_shell, split_command};

/// Default subprocess timeout: 300 seconds.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// A command to spawn: shell string or explicit argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// Interpreted: `sh -c` when metacharacters appear, tokenized otherwise.
    Shell(String),
    /// Explicit argument vector; never touches a shell.
    Argv(Vec<String>),
}

impl CommandSpec {
    /// Lower to the argv that will actually be spawned.
    pub fn to_argv(&self) -> Vec<String> {
        match self {
            CommandSpec::Shell(command) if needs_shell(command) => {
                vec!["sh".to_string(), "-c".to_string(), command.clone()]
            }
            CommandSpec::Shell(command) => split_command(command),
            CommandSpec::Argv(argv) => argv.clone(),
        }
    }

    /// Human-readable form for logs and error messages.
    pub fn display(&self) -> String {
        match self {
            CommandSpec::Shell(command) => command.clone(),
            CommandSpec::Argv(argv) => argv.join(" "),
        }
    }
}

/// Spawn `spec` and wait for completion under `bound`.
///
/// Returns `Ok` with a failed [`CommandResult`] on non-zero exit; only
/// spawn problems and timeouts surface as `Err`. The child is killed when
/// the timeout future is dropped.
pub(crate) async fn run_command(
    spec: &CommandSpec,
    cwd: Option<&PathBuf>,
    env: &HashMap<String, String>,
    bound: Duration,
) -> Result<CommandResult> {
    let argv = spec.to_argv();
    if argv.is_empty() {
        return Err(EngineError::config("empty command"));
    }

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }

    let started = Instant::now();
    let child = cmd.spawn()?;

    let output = match timeout(bound, child.wait_with_output()).await {
        Ok(output) => output?,
        // Dropping the future drops the child, which kills it.
        Err(_) => {
            return Err(EngineError::timeout(
                spec.display(),
                bound.as_millis() as u64,
            ))
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let exit_code = output.status.code();
    let success = output.status.success();

    Ok(CommandResult {
        success,
        stdout,
        stderr,
        exit_code,
        duration_ms: started.elapsed().as_millis() as u64,
        error: if success {
            None
        } else {
            Some(format!("exit code {:?}", exit_code))
        },
    })
}

/// Subprocess node with a fixed command string
pub struct CommandNode {
    name: String,
    command: String,
    cwd: Option<PathBuf>,
    env: HashMap<String, String>,
    timeout: Duration,
    throw_on_error: bool,
    result_key: String,
    then: Transition,
}

impl CommandNode {
    pub fn new(name: impl Into<String>, command: impl Into<String>, then: Transition) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            cwd: None,
            env: HashMap::new(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            throw_on_error: true,
            result_key: keys::LAST_COMMAND_RESULT.to_string(),
            then,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_throw_on_error(mut self, throw: bool) -> Self {
        self.throw_on_error = throw;
        self
    }

    pub fn with_result_key(mut self, key: impl Into<String>) -> Self {
        self.result_key = key.into();
        self
    }
}

#[async_trait]
impl NodeRuntime for CommandNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Command
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(EngineError::config(format!(
                "command node '{}' has an empty command",
                self.name
            )));
        }
        if self.timeout.is_zero() {
            return Err(EngineError::config(format!(
                "command node '{}' has a zero timeout",
                self.name
            )));
        }
        Ok(())
    }

    async fn execute(&self, _state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        let spec = CommandSpec::Shell(self.command.clone());
        tracing::debug!(node = %self.name, command = %spec.display(), "spawning command");

        let result = match run_command(&spec, self.cwd.as_ref(), &self.env, self.timeout).await {
            Ok(result) => result,
            Err(err @ EngineError::Timeout { .. }) if !self.throw_on_error => CommandResult {
                success: false,
                stdout: String::new(),
                stderr: String::new(),
                exit_code: None,
                duration_ms: self.timeout.as_millis() as u64,
                error: Some(err.to_string()),
            },
            Err(err) => return Err(err),
        };

        if !result.success && self.throw_on_error {
            return Err(EngineError::node_execution(
                &self.name,
                NodeKind::Command,
                format!(
                    "command failed ({}): {}",
                    result.error.as_deref().unwrap_or("unknown"),
                    result.stderr
                ),
            ));
        }

        let delta = StateDelta::context_value(self.result_key.clone(), serde_json::to_value(&result)?);
        Ok(NodeOutcome::from_delta(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> EngineContext {
        EngineContext::new("test-run")
    }

    fn state() -> WorkflowState {
        WorkflowState::new("CMD")
    }

    #[test]
    fn test_spec_lowering() {
        assert_eq!(
            CommandSpec::Shell("echo hi | wc -c".into()).to_argv(),
            vec!["sh", "-c", "echo hi | wc -c"]
        );
        assert_eq!(
            CommandSpec::Shell("echo 'hi there'".into()).to_argv(),
            vec!["echo", "hi there"]
        );
        assert_eq!(
            CommandSpec::Argv(vec!["git".into(), "a | b".into()]).to_argv(),
            vec!["git", "a | b"]
        );
    }

    #[tokio::test]
    async fn test_command_captures_trimmed_output() {
        let node = CommandNode::new("CMD", "echo hello", Transition::end());
        let outcome = node.execute(&state(), &ctx()).await.unwrap();
        let result = &outcome.delta.context[keys::LAST_COMMAND_RESULT];
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["stdout"], json!("hello"));
        assert_eq!(result["exitCode"], json!(0));
    }

    #[tokio::test]
    async fn test_shell_meta_runs_under_sh() {
        let node = CommandNode::new("CMD", "echo one && echo two", Transition::end());
        let outcome = node.execute(&state(), &ctx()).await.unwrap();
        let result = &outcome.delta.context[keys::LAST_COMMAND_RESULT];
        assert_eq!(result["stdout"], json!("one\ntwo"));
    }

    #[tokio::test]
    async fn test_failure_throws_by_default() {
        let node = CommandNode::new("CMD", "sh -c 'exit 3'", Transition::end());
        let err = node.execute(&state(), &ctx()).await.unwrap_err();
        assert!(matches!(err, EngineError::NodeExecution { .. }));
    }

    #[tokio::test]
    async fn test_failure_recorded_when_not_throwing() {
        let node = CommandNode::new("TEST", "sh -c 'echo boom >&2; exit 1'", Transition::end())
            .with_throw_on_error(false);
        let outcome = node.execute(&state(), &ctx()).await.unwrap();
        let result = &outcome.delta.context[keys::LAST_COMMAND_RESULT];
        assert_eq!(result["success"], json!(false));
        assert_eq!(result["exitCode"], json!(1));
        assert_eq!(result["stderr"], json!("boom"));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let node = CommandNode::new("SLOW", "sleep 30", Transition::end())
            .with_timeout(Duration::from_millis(100));
        let err = node.execute(&state(), &ctx()).await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_timeout_recorded_when_not_throwing() {
        let node = CommandNode::new("SLOW", "sleep 30", Transition::end())
            .with_timeout(Duration::from_millis(100))
            .with_throw_on_error(false);
        let outcome = node.execute(&state(), &ctx()).await.unwrap();
        let result = &outcome.delta.context[keys::LAST_COMMAND_RESULT];
        assert_eq!(result["success"], json!(false));
        assert!(result["error"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_env_and_result_key_override() {
        let node = CommandNode::new("CMD", "sh -c 'echo $MARKER'", Transition::end())
            .with_env("MARKER", "present")
            .with_result_key("probeResult");
        let outcome = node.execute(&state(), &ctx()).await.unwrap();
        assert_eq!(outcome.delta.context["probeResult"]["stdout"], json!("present"));
    }

    #[test]
    fn test_validation_rejects_empty_command() {
        let node = CommandNode::new("CMD", "  ", Transition::end());
        assert!(node.validate().is_err());
    }
}
