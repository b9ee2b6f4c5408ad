//! CLI workflow-config file
//!
//! The single positional argument names a YAML file selecting which
//! prebuilt workflow to run plus engine tuning. Everything
//! environment-shaped (tokens, issue numbers, project coordinates) stays
//! in environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Which prebuilt workflow to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowKind {
    Dispatch,
    IssueProcessor,
}

/// Parsed workflow-config file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowFile {
    pub workflow: WorkflowKind,

    /// Run id; defaults per workflow when unset.
    #[serde(default)]
    pub run_id: Option<String>,

    /// Snapshot directory. Default `.flowgraph/state`.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Engine retry budget. Default 0.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Model id for agent steps (issue-processor only).
    #[serde(default)]
    pub model: Option<String>,
}

impl WorkflowFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading workflow config {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing workflow config {}", path.display()))
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".flowgraph/state"))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_dispatch_config() {
        let parsed: WorkflowFile = serde_yaml::from_str("workflow: dispatch\n").unwrap();
        assert_eq!(parsed.workflow, WorkflowKind::Dispatch);
        assert_eq!(parsed.state_dir(), PathBuf::from(".flowgraph/state"));
        assert_eq!(parsed.max_retries(), 0);
    }

    #[test]
    fn test_parse_issue_processor_config() {
        let parsed: WorkflowFile = serde_yaml::from_str(
            "workflow: issue-processor\nrun_id: issue-42\nstate_dir: /tmp/state\nmax_retries: 2\nmodel: claude-sonnet-4-20250514\n",
        )
        .unwrap();
        assert_eq!(parsed.workflow, WorkflowKind::IssueProcessor);
        assert_eq!(parsed.run_id.as_deref(), Some("issue-42"));
        assert_eq!(parsed.max_retries(), 2);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<WorkflowFile, _> =
            serde_yaml::from_str("workflow: dispatch\nbogus: 1\n");
        assert!(result.is_err());
    }
}
