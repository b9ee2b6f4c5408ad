//! Dispatch configuration from the environment

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::DispatchError;

/// Where the queue of issues comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceType {
    /// Open issues carrying a label.
    #[default]
    Label,
    /// Items of a project board in a given status.
    Project,
}

impl FromStr for SourceType {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "label" => Ok(SourceType::Label),
            "project" => Ok(SourceType::Project),
            other => Err(DispatchError::config(format!(
                "GRAPH_SOURCE must be 'label' or 'project', got '{other}'"
            ))),
        }
    }
}

/// Fully-resolved dispatch configuration
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub source: SourceType,
    pub label: String,
    pub project_owner: Option<String>,
    pub project_number: Option<u64>,
    pub ready_status: String,
    pub in_progress_status: String,
    pub priority_field: String,
    /// `None` or non-positive means unbounded.
    pub max_concurrent: Option<i64>,
    pub dry_run: bool,
    pub output_file: Option<PathBuf>,
}

impl DispatchConfig {
    /// Load from the `GITHUB_*`/`GRAPH_*` environment variables.
    pub fn from_env() -> Result<Self, DispatchError> {
        let token = require("GITHUB_TOKEN")?;
        let repository = require("GITHUB_REPOSITORY")?;
        let (owner, repo) = repository.split_once('/').ok_or_else(|| {
            DispatchError::config(format!(
                "GITHUB_REPOSITORY must be owner/repo, got '{repository}'"
            ))
        })?;

        let source: SourceType = optional("GRAPH_SOURCE")
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();

        let project_owner = optional("GRAPH_PROJECT_OWNER");
        let project_number = optional("GRAPH_PROJECT_NUMBER")
            .map(|s| {
                s.parse::<u64>().map_err(|_| {
                    DispatchError::config(format!("GRAPH_PROJECT_NUMBER must be numeric, got '{s}'"))
                })
            })
            .transpose()?;
        if source == SourceType::Project && (project_owner.is_none() || project_number.is_none()) {
            return Err(DispatchError::config(
                "GRAPH_PROJECT_OWNER and GRAPH_PROJECT_NUMBER are required when GRAPH_SOURCE=project",
            ));
        }

        let max_concurrent = optional("GRAPH_MAX_CONCURRENT")
            .map(|s| {
                s.parse::<i64>().map_err(|_| {
                    DispatchError::config(format!("GRAPH_MAX_CONCURRENT must be numeric, got '{s}'"))
                })
            })
            .transpose()?;

        Ok(Self {
            token,
            owner: owner.to_string(),
            repo: repo.to_string(),
            source,
            label: optional("GRAPH_LABEL").unwrap_or_else(|| "queue".to_string()),
            project_owner,
            project_number,
            ready_status: optional("GRAPH_READY_STATUS").unwrap_or_else(|| "Ready".to_string()),
            in_progress_status: optional("GRAPH_IN_PROGRESS_STATUS")
                .unwrap_or_else(|| "In Progress".to_string()),
            priority_field: optional("GRAPH_PRIORITY_FIELD")
                .unwrap_or_else(|| "Priority".to_string()),
            max_concurrent,
            dry_run: optional("GRAPH_DRY_RUN")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
            output_file: optional("GRAPH_OUTPUT_FILE").map(PathBuf::from),
        })
    }

    /// The effective dispatch bound; `None` means unbounded.
    pub fn effective_max_concurrent(&self) -> Option<usize> {
        match self.max_concurrent {
            Some(n) if n > 0 => Some(n as usize),
            _ => None,
        }
    }
}

fn require(name: &str) -> Result<String, DispatchError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DispatchError::config(format!("{name} is required")))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> DispatchConfig {
        DispatchConfig {
            token: "t".into(),
            owner: "o".into(),
            repo: "r".into(),
            source: SourceType::Label,
            label: "queue".into(),
            project_owner: None,
            project_number: None,
            ready_status: "Ready".into(),
            in_progress_status: "In Progress".into(),
            priority_field: "Priority".into(),
            max_concurrent: None,
            dry_run: false,
            output_file: None,
        }
    }

    #[test]
    fn test_source_type_parsing() {
        assert_eq!("label".parse::<SourceType>().unwrap(), SourceType::Label);
        assert_eq!("Project".parse::<SourceType>().unwrap(), SourceType::Project);
        assert!("webhook".parse::<SourceType>().is_err());
    }

    #[test]
    fn test_non_positive_max_concurrent_is_unbounded() {
        let mut config = base_config();
        assert_eq!(config.effective_max_concurrent(), None);

        config.max_concurrent = Some(0);
        assert_eq!(config.effective_max_concurrent(), None);

        config.max_concurrent = Some(-3);
        assert_eq!(config.effective_max_concurrent(), None);

        config.max_concurrent = Some(2);
        assert_eq!(config.effective_max_concurrent(), Some(2));
    }
}
