//! Outcome records and the result-key convention
//!
//! Every node writes a serialized outcome record into the run context so
//! downstream nodes and dashboards can observe what happened without
//! parsing logs. The default key per kind lives in [`keys`]; nodes accept
//! an override.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::Usage;

/// Default context keys for node outcome records.
pub mod keys {
    pub const LAST_COMMAND_RESULT: &str = "lastCommandResult";
    pub const LAST_DYNAMIC_COMMAND_RESULT: &str = "lastDynamicCommandResult";
    pub const LAST_HTTP_RESULT: &str = "lastHttpResult";
    pub const LAST_LLM_RESULT: &str = "lastLLMResult";
    pub const LAST_AGENT_RESULT: &str = "lastAgentResult";
    pub const LAST_EVAL_RESULT: &str = "lastEvalResult";
    pub const LAST_SLASH_COMMAND_RESULT: &str = "lastSlashCommandResult";
    pub const LAST_PROJECT_RESULT: &str = "lastProjectResult";
    pub const LAST_COMMENT_RESULT: &str = "lastCommentResult";
    pub const LAST_PR_VISUALIZER_RESULT: &str = "lastPRVisualizerResult";
    pub const LAST_CHECKOUT_RESULT: &str = "lastCheckoutResult";

    /// Canonical mirror of the checkout work directory for downstream
    /// nodes that should not care how the directory was produced.
    pub const WORK_DIR: &str = "workDir";
}

/// Outcome of a subprocess execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of an LLM completion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResult {
    pub success: bool,
    pub raw_output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Outcome of an agent session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_affected: Vec<String>,
    pub duration_ms: u64,
}

/// Outcome of an eval transform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalReport {
    pub success: bool,
    pub updated_keys: Vec<String>,
    pub duration_ms: u64,
}

/// Outcome of an HTTP request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResult {
    pub status: u16,
    pub status_text: String,
    pub headers: serde_json::Map<String, Value>,
    pub data: Value,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a git checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResult {
    pub work_dir: String,
    pub owner: String,
    pub repo: String,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub sha: String,
}
