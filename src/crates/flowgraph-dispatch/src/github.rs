//! GitHub implementations of the tracker seams
//!
//! [`GitHubIssueClient`] covers the REST surface (issue listing, comments)
//! plus the GraphQL sub-issues edge; [`GitHubProjectClient`] drives
//! Projects V2 over GraphQL. Both share a small GraphQL POST helper and
//! navigate responses with JSON pointers rather than a full schema
//! binding - the queries are few and stable.
//!
//! Response parsing is kept in free functions over the raw JSON bodies
//! (`issue_from_rest`, `parse_sub_issue_nodes`, `single_select_fields`,
//! `issue_from_project_content`, `content_matches`, `find_field_option`)
//! so the non-trivial extraction logic tests without a network.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{DispatchError, ProjectsError};
use crate::tracker::{IssueClient, ProjectClient, SubIssueRef};
use crate::types::{IssueState, QueuedIssue};

const API_BASE: &str = "https://api.github.com";
const GRAPHQL_URL: &str = "https://api.github.com/graphql";
const USER_AGENT: &str = "flowgraph-dispatch";

fn build_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()
        .expect("reqwest client with static configuration")
}

async fn graphql(
    client: &Client,
    url: &str,
    token: &str,
    query: &str,
    variables: Value,
) -> Result<Value, DispatchError> {
    let response = client
        .post(url)
        .bearer_auth(token)
        .json(&json!({"query": query, "variables": variables}))
        .send()
        .await?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(DispatchError::Auth(format!("GraphQL returned {status}")));
    }
    if !status.is_success() {
        return Err(DispatchError::response(format!(
            "GraphQL returned HTTP {status}"
        )));
    }

    let body: Value = response.json().await?;
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            return Err(DispatchError::response(format!(
                "GraphQL errors: {}",
                serde_json::to_string(errors).unwrap_or_default()
            )));
        }
    }
    Ok(body)
}

#[derive(Deserialize)]
struct ApiIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    labels: Vec<ApiLabel>,
    html_url: String,
    #[serde(default)]
    pull_request: Option<Value>,
}

#[derive(Deserialize)]
struct ApiLabel {
    name: String,
}

/// Map a REST issue into a [`QueuedIssue`].
///
/// The issues endpoint also returns pull requests; those map to `None`.
fn issue_from_rest(owner: &str, repo: &str, issue: ApiIssue) -> Option<QueuedIssue> {
    if issue.pull_request.is_some() {
        return None;
    }
    Some(QueuedIssue {
        number: issue.number,
        title: issue.title,
        body: issue.body.unwrap_or_default(),
        state: if issue.state == "closed" {
            IssueState::Closed
        } else {
            IssueState::Open
        },
        labels: issue.labels.into_iter().map(|l| l.name).collect(),
        owner: owner.to_string(),
        repo: repo.to_string(),
        url: issue.html_url,
        sub_issue_numbers: None,
        parent_issue_number: None,
        project_priority: None,
    })
}

/// Extract `{number, state}` pairs from the sub-issues edge nodes.
/// Malformed entries are skipped.
fn parse_sub_issue_nodes(nodes: &[Value]) -> Vec<SubIssueRef> {
    nodes
        .iter()
        .filter_map(|node| {
            let number = node.get("number")?.as_u64()?;
            let state = match node.get("state")?.as_str()? {
                "CLOSED" => IssueState::Closed,
                _ => IssueState::Open,
            };
            Some(SubIssueRef { number, state })
        })
        .collect()
}

/// Pull the status and priority single-select values off a project item.
fn single_select_fields(
    item: &Value,
    status_field: &str,
    priority_field: &str,
) -> (Option<String>, Option<String>) {
    let mut status = None;
    let mut priority = None;
    for field_value in item
        .pointer("/fieldValues/nodes")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let field_name = field_value.pointer("/field/name").and_then(Value::as_str);
        let value = field_value.get("name").and_then(Value::as_str);
        match field_name {
            Some(name) if name == status_field => status = value.map(String::from),
            Some(name) if name == priority_field => priority = value.map(String::from),
            _ => {}
        }
    }
    (status, priority)
}

/// Map a project item's issue content into a [`QueuedIssue`].
///
/// Draft items carry no issue content (no `number`) and map to `None`.
fn issue_from_project_content(content: &Value, priority: Option<String>) -> Option<QueuedIssue> {
    let number = content["number"].as_u64()?;
    Some(QueuedIssue {
        number,
        title: content["title"].as_str().unwrap_or_default().to_string(),
        body: content["body"].as_str().unwrap_or_default().to_string(),
        state: if content["state"].as_str() == Some("CLOSED") {
            IssueState::Closed
        } else {
            IssueState::Open
        },
        labels: content
            .pointer("/labels/nodes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|l| l["name"].as_str().map(String::from))
            .collect(),
        owner: content
            .pointer("/repository/owner/login")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        repo: content
            .pointer("/repository/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        url: content["url"].as_str().unwrap_or_default().to_string(),
        sub_issue_numbers: None,
        parent_issue_number: None,
        project_priority: priority,
    })
}

/// Whether a project item's content is the given issue.
fn content_matches(content: &Value, owner: &str, repo: &str, number: u64) -> bool {
    content["number"].as_u64() == Some(number)
        && content.pointer("/repository/name").and_then(Value::as_str) == Some(repo)
        && content
            .pointer("/repository/owner/login")
            .and_then(Value::as_str)
            == Some(owner)
}

/// Locate a single-select field and one of its options by name.
fn find_field_option(
    fields: &[Value],
    field_name: &str,
    option_name: &str,
) -> Result<(String, String), ProjectsError> {
    for field in fields {
        if field["name"].as_str() != Some(field_name) {
            continue;
        }
        let field_id = field["id"]
            .as_str()
            .ok_or_else(|| ProjectsError::new("GRAPHQL", "field id missing"))?;
        for option in field["options"].as_array().into_iter().flatten() {
            if option["name"].as_str() == Some(option_name) {
                let option_id = option["id"]
                    .as_str()
                    .ok_or_else(|| ProjectsError::new("GRAPHQL", "option id missing"))?;
                return Ok((field_id.to_string(), option_id.to_string()));
            }
        }
        return Err(ProjectsError::new(
            "OPTION_NOT_FOUND",
            format!("field '{field_name}' has no option '{option_name}'"),
        ));
    }
    Err(ProjectsError::new(
        "FIELD_NOT_FOUND",
        format!("project has no field '{field_name}'"),
    ))
}

/// REST + sub-issues client
#[derive(Clone)]
pub struct GitHubIssueClient {
    client: Client,
    token: String,
    api_base: String,
    graphql_url: String,
}

impl GitHubIssueClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            token: token.into(),
            api_base: API_BASE.to_string(),
            graphql_url: GRAPHQL_URL.to_string(),
        }
    }

    /// Point at a GitHub Enterprise instance or a test server.
    pub fn with_base_urls(
        mut self,
        api_base: impl Into<String>,
        graphql_url: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into();
        self.graphql_url = graphql_url.into();
        self
    }
}

#[async_trait]
impl IssueClient for GitHubIssueClient {
    async fn list_issues_by_label(
        &self,
        owner: &str,
        repo: &str,
        label: &str,
    ) -> Result<Vec<QueuedIssue>, DispatchError> {
        let url = format!("{}/repos/{owner}/{repo}/issues", self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("labels", label), ("state", "open"), ("per_page", "100")])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DispatchError::Auth("issue listing returned 401".into()));
        }
        if !status.is_success() {
            return Err(DispatchError::response(format!(
                "issue listing returned HTTP {status}"
            )));
        }

        let issues: Vec<ApiIssue> = response.json().await?;
        Ok(issues
            .into_iter()
            .filter_map(|issue| issue_from_rest(owner, repo, issue))
            .collect())
    }

    async fn fetch_sub_issues(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<SubIssueRef>, DispatchError> {
        let query = r#"
            query($owner: String!, $repo: String!, $number: Int!) {
                repository(owner: $owner, name: $repo) {
                    issue(number: $number) {
                        subIssues(first: 100) {
                            nodes { number state }
                        }
                    }
                }
            }
        "#;
        let body = graphql(
            &self.client,
            &self.graphql_url,
            &self.token,
            query,
            json!({"owner": owner, "repo": repo, "number": number}),
        )
        .await?;

        let nodes = body
            .pointer("/data/repository/issue/subIssues/nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| DispatchError::response("sub-issues edge missing from response"))?;

        Ok(parse_sub_issue_nodes(nodes))
    }

    async fn post_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), DispatchError> {
        let url = format!(
            "{}/repos/{owner}/{repo}/issues/{number}/comments",
            self.api_base
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({"body": body}))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DispatchError::response(format!(
                "comment post returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Projects V2 GraphQL client
#[derive(Clone)]
pub struct GitHubProjectClient {
    client: Client,
    token: String,
    graphql_url: String,
    project_owner: String,
    project_number: u64,
    status_field: String,
    priority_field: String,
}

impl GitHubProjectClient {
    pub fn new(
        token: impl Into<String>,
        project_owner: impl Into<String>,
        project_number: u64,
        priority_field: impl Into<String>,
    ) -> Self {
        Self {
            client: build_client(),
            token: token.into(),
            graphql_url: GRAPHQL_URL.to_string(),
            project_owner: project_owner.into(),
            project_number,
            status_field: "Status".to_string(),
            priority_field: priority_field.into(),
        }
    }

    pub fn with_graphql_url(mut self, url: impl Into<String>) -> Self {
        self.graphql_url = url.into();
        self
    }

    async fn query(&self, query: &str, variables: Value) -> Result<Value, ProjectsError> {
        graphql(&self.client, &self.graphql_url, &self.token, query, variables)
            .await
            .map_err(|e| match e {
                DispatchError::Auth(details) => ProjectsError::new("AUTH", details),
                other => ProjectsError::new("GRAPHQL", other.to_string()),
            })
    }

    async fn project_id(&self) -> Result<String, ProjectsError> {
        let query = r#"
            query($owner: String!, $number: Int!) {
                organization(login: $owner) { projectV2(number: $number) { id } }
                user(login: $owner) { projectV2(number: $number) { id } }
            }
        "#;
        let body = self
            .query(
                query,
                json!({"owner": self.project_owner, "number": self.project_number}),
            )
            .await?;

        body.pointer("/data/organization/projectV2/id")
            .or_else(|| body.pointer("/data/user/projectV2/id"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| {
                ProjectsError::new(
                    "PROJECT_NOT_FOUND",
                    format!(
                        "project {}/{} does not exist or is not accessible",
                        self.project_owner, self.project_number
                    ),
                )
            })
    }

    /// Walk the item list page by page, applying `visit` to each item
    /// node until it produces a value.
    async fn scan_items<T>(
        &self,
        mut visit: impl FnMut(&Value) -> Option<T>,
    ) -> Result<Option<T>, ProjectsError> {
        let query = r#"
            query($owner: String!, $number: Int!, $cursor: String) {
                organization(login: $owner) {
                    projectV2(number: $number) {
                        items(first: 100, after: $cursor) {
                            pageInfo { hasNextPage endCursor }
                            nodes {
                                id
                                fieldValues(first: 20) {
                                    nodes {
                                        ... on ProjectV2ItemFieldSingleSelectValue {
                                            name
                                            field { ... on ProjectV2SingleSelectField { name } }
                                        }
                                    }
                                }
                                content {
                                    ... on Issue {
                                        number title body state url
                                        labels(first: 20) { nodes { name } }
                                        repository { name owner { login } }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        "#;

        let mut cursor: Option<String> = None;
        loop {
            let body = self
                .query(
                    query,
                    json!({
                        "owner": self.project_owner,
                        "number": self.project_number,
                        "cursor": cursor,
                    }),
                )
                .await?;
            let items = body
                .pointer("/data/organization/projectV2/items")
                .ok_or_else(|| ProjectsError::new("GRAPHQL", "items missing from response"))?;

            for node in items
                .pointer("/nodes")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                if let Some(found) = visit(node) {
                    return Ok(Some(found));
                }
            }

            if items.pointer("/pageInfo/hasNextPage") == Some(&Value::Bool(true)) {
                cursor = items
                    .pointer("/pageInfo/endCursor")
                    .and_then(Value::as_str)
                    .map(String::from);
            } else {
                return Ok(None);
            }
        }
    }

    async fn item_id_for_issue(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
    ) -> Result<Option<String>, ProjectsError> {
        self.scan_items(|node| {
            if content_matches(&node["content"], owner, repo, issue_number) {
                node["id"].as_str().map(String::from)
            } else {
                None
            }
        })
        .await
    }

    async fn field_option(
        &self,
        field_name: &str,
        option_name: &str,
    ) -> Result<(String, String), ProjectsError> {
        let query = r#"
            query($owner: String!, $number: Int!) {
                organization(login: $owner) {
                    projectV2(number: $number) {
                        fields(first: 50) {
                            nodes {
                                ... on ProjectV2SingleSelectField {
                                    id name options { id name }
                                }
                            }
                        }
                    }
                }
            }
        "#;
        let body = self
            .query(
                query,
                json!({"owner": self.project_owner, "number": self.project_number}),
            )
            .await?;

        let fields = body
            .pointer("/data/organization/projectV2/fields/nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| ProjectsError::new("GRAPHQL", "fields missing from response"))?;

        find_field_option(fields, field_name, option_name)
    }

    async fn set_field_option(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        field_name: &str,
        option_name: &str,
    ) -> Result<(), ProjectsError> {
        let project_id = self.project_id().await?;
        let item_id = self
            .item_id_for_issue(owner, repo, issue_number)
            .await?
            .ok_or_else(|| {
                ProjectsError::new(
                    "ITEM_NOT_FOUND",
                    format!("issue {owner}/{repo}#{issue_number} is not on the board"),
                )
            })?;
        let (field_id, option_id) = self.field_option(field_name, option_name).await?;

        let mutation = r#"
            mutation($project: ID!, $item: ID!, $field: ID!, $option: String!) {
                updateProjectV2ItemFieldValue(input: {
                    projectId: $project, itemId: $item, fieldId: $field,
                    value: { singleSelectOptionId: $option }
                }) { projectV2Item { id } }
            }
        "#;
        self.query(
            mutation,
            json!({
                "project": project_id,
                "item": item_id,
                "field": field_id,
                "option": option_id,
            }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectClient for GitHubProjectClient {
    async fn validate(&self) -> Result<(), ProjectsError> {
        self.project_id().await.map(|_| ())
    }

    async fn fetch_items_by_status(
        &self,
        status: &str,
    ) -> Result<Vec<QueuedIssue>, ProjectsError> {
        let mut issues = Vec::new();
        self.scan_items(|node| {
            let (item_status, priority) =
                single_select_fields(node, &self.status_field, &self.priority_field);
            if item_status.as_deref() == Some(status) {
                if let Some(issue) = issue_from_project_content(&node["content"], priority) {
                    issues.push(issue);
                }
            }
            None::<()>
        })
        .await?;
        Ok(issues)
    }

    async fn update_status(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        status: &str,
    ) -> Result<(), ProjectsError> {
        let status_field = self.status_field.clone();
        self.set_field_option(owner, repo, issue_number, &status_field, status)
            .await
    }

    async fn update_fields(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        fields: &Map<String, Value>,
    ) -> Result<(), ProjectsError> {
        for (field, value) in fields {
            let Some(option) = value.as_str() else {
                return Err(ProjectsError::new(
                    "UNSUPPORTED_VALUE",
                    format!("field '{field}' value must be a string option name"),
                ));
            };
            self.set_field_option(owner, repo, issue_number, field, option)
                .await?;
        }
        Ok(())
    }

    async fn get_issue_status(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
    ) -> Result<Option<String>, ProjectsError> {
        let found = self
            .scan_items(|node| {
                if content_matches(&node["content"], owner, repo, issue_number) {
                    let (status, _) =
                        single_select_fields(node, &self.status_field, &self.priority_field);
                    Some(status)
                } else {
                    None
                }
            })
            .await?;
        Ok(found.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_item() -> Value {
        json!({
            "id": "PVTI_item1",
            "fieldValues": {
                "nodes": [
                    {},
                    {"name": "Ready", "field": {"name": "Status"}},
                    {"name": "High", "field": {"name": "Priority"}},
                    {"name": "Q3", "field": {"name": "Milestone"}}
                ]
            },
            "content": {
                "number": 42,
                "title": "Fix the parser",
                "body": "Details.",
                "state": "OPEN",
                "url": "https://github.com/octo/hello/issues/42",
                "labels": {"nodes": [{"name": "bug"}, {"name": "priority:low"}]},
                "repository": {"name": "hello", "owner": {"login": "octo"}}
            }
        })
    }

    #[test]
    fn test_client_creation() {
        let issues = GitHubIssueClient::new("token")
            .with_base_urls("https://ghe.example.com/api/v3", "https://ghe.example.com/api/graphql");
        assert_eq!(issues.api_base, "https://ghe.example.com/api/v3");
        assert_eq!(issues.graphql_url, "https://ghe.example.com/api/graphql");

        let project = GitHubProjectClient::new("token", "octo", 5, "Priority")
            .with_graphql_url("https://ghe.example.com/api/graphql");
        assert_eq!(project.project_owner, "octo");
        assert_eq!(project.project_number, 5);
        assert_eq!(project.status_field, "Status");
        assert_eq!(project.graphql_url, "https://ghe.example.com/api/graphql");
    }

    #[test]
    fn test_issue_from_rest_maps_fields() {
        let api_issue: ApiIssue = serde_json::from_value(json!({
            "number": 10,
            "title": "Broken build",
            "body": "It fails.",
            "state": "open",
            "labels": [{"name": "queue"}, {"name": "priority:high"}],
            "html_url": "https://github.com/octo/hello/issues/10"
        }))
        .unwrap();

        let issue = issue_from_rest("octo", "hello", api_issue).unwrap();
        assert_eq!(issue.number, 10);
        assert_eq!(issue.state, IssueState::Open);
        assert_eq!(issue.labels, vec!["queue", "priority:high"]);
        assert_eq!(issue.owner, "octo");
        assert_eq!(issue.repo, "hello");
        assert!(issue.sub_issue_numbers.is_none());
    }

    #[test]
    fn test_issue_from_rest_filters_pull_requests() {
        let api_issue: ApiIssue = serde_json::from_value(json!({
            "number": 11,
            "title": "A PR",
            "state": "open",
            "html_url": "https://github.com/octo/hello/pull/11",
            "pull_request": {"url": "https://api.github.com/repos/octo/hello/pulls/11"}
        }))
        .unwrap();

        assert!(issue_from_rest("octo", "hello", api_issue).is_none());
    }

    #[test]
    fn test_parse_sub_issue_nodes() {
        let nodes = vec![
            json!({"number": 3, "state": "OPEN"}),
            json!({"number": 4, "state": "CLOSED"}),
            json!({"state": "OPEN"}),  // malformed: no number
            json!({"number": 5}),      // malformed: no state
        ];
        let refs = parse_sub_issue_nodes(&nodes);
        assert_eq!(
            refs,
            vec![
                SubIssueRef {
                    number: 3,
                    state: IssueState::Open
                },
                SubIssueRef {
                    number: 4,
                    state: IssueState::Closed
                },
            ]
        );
    }

    #[test]
    fn test_single_select_fields_extraction() {
        let (status, priority) = single_select_fields(&project_item(), "Status", "Priority");
        assert_eq!(status.as_deref(), Some("Ready"));
        assert_eq!(priority.as_deref(), Some("High"));

        // Unconfigured field names simply come back empty.
        let (status, priority) = single_select_fields(&project_item(), "State", "Severity");
        assert!(status.is_none());
        assert!(priority.is_none());
    }

    #[test]
    fn test_issue_from_project_content() {
        let item = project_item();
        let issue = issue_from_project_content(&item["content"], Some("High".into())).unwrap();
        assert_eq!(issue.number, 42);
        assert_eq!(issue.owner, "octo");
        assert_eq!(issue.repo, "hello");
        assert_eq!(issue.state, IssueState::Open);
        assert_eq!(issue.labels, vec!["bug", "priority:low"]);
        assert_eq!(issue.project_priority.as_deref(), Some("High"));
    }

    #[test]
    fn test_draft_items_have_no_issue() {
        // Draft project items carry no issue content.
        assert!(issue_from_project_content(&json!({}), None).is_none());
    }

    #[test]
    fn test_content_matches() {
        let item = project_item();
        assert!(content_matches(&item["content"], "octo", "hello", 42));
        assert!(!content_matches(&item["content"], "octo", "hello", 43));
        assert!(!content_matches(&item["content"], "octo", "world", 42));
        assert!(!content_matches(&item["content"], "other", "hello", 42));
        assert!(!content_matches(&json!({}), "octo", "hello", 42));
    }

    #[test]
    fn test_find_field_option() {
        let fields = vec![
            json!({}),  // non-single-select fields come through empty
            json!({
                "id": "F_status",
                "name": "Status",
                "options": [
                    {"id": "O_ready", "name": "Ready"},
                    {"id": "O_done", "name": "Done"}
                ]
            }),
        ];

        let (field_id, option_id) = find_field_option(&fields, "Status", "Done").unwrap();
        assert_eq!(field_id, "F_status");
        assert_eq!(option_id, "O_done");
    }

    #[test]
    fn test_find_field_option_errors() {
        let fields = vec![json!({
            "id": "F_status",
            "name": "Status",
            "options": [{"id": "O_ready", "name": "Ready"}]
        })];

        let err = find_field_option(&fields, "Status", "Archived").unwrap_err();
        assert_eq!(err.code, "OPTION_NOT_FOUND");

        let err = find_field_option(&fields, "Priority", "High").unwrap_err();
        assert_eq!(err.code, "FIELD_NOT_FOUND");
    }
}
