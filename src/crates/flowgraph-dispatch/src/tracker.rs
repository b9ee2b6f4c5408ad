//! Tracker client seams
//!
//! The resolver talks to the issue REST surface and the project tracker
//! only through these traits. Concrete GitHub implementations live in
//! [`crate::github`]; tests inject stubs.

use async_trait::async_trait;
use serde_json::Map;

use crate::error::{DispatchError, ProjectsError};
use crate::types::{IssueState, QueuedIssue};

/// A sub-issue edge result: the child's number and cached state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubIssueRef {
    pub number: u64,
    pub state: IssueState,
}

/// Issue REST surface
#[async_trait]
pub trait IssueClient: Send + Sync {
    /// Open issues carrying `label`.
    async fn list_issues_by_label(
        &self,
        owner: &str,
        repo: &str,
        label: &str,
    ) -> Result<Vec<QueuedIssue>, DispatchError>;

    /// The sub-issues edge for one issue. Errors here are treated as
    /// *soft* by the resolver (the edge is optional per tenant).
    async fn fetch_sub_issues(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<SubIssueRef>, DispatchError>;

    /// Post a comment on an issue.
    async fn post_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), DispatchError>;
}

/// Project tracker surface
///
/// All failures are typed [`ProjectsError`]s; the resolver treats them as
/// fatal.
#[async_trait]
pub trait ProjectClient: Send + Sync {
    /// Confirm the project exists and is accessible.
    async fn validate(&self) -> Result<(), ProjectsError>;

    /// Items whose status field equals `status`, mapped to issues with
    /// the priority field attached.
    async fn fetch_items_by_status(&self, status: &str)
        -> Result<Vec<QueuedIssue>, ProjectsError>;

    /// Move an issue's project status.
    async fn update_status(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        status: &str,
    ) -> Result<(), ProjectsError>;

    /// Set arbitrary project fields on an issue's item.
    async fn update_fields(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        fields: &Map<String, serde_json::Value>,
    ) -> Result<(), ProjectsError>;

    /// Current status of an issue's item, if it is on the board.
    async fn get_issue_status(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
    ) -> Result<Option<String>, ProjectsError>;
}
