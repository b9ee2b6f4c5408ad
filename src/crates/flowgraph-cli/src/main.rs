//! # flowgraph
//!
//! CLI entry point: run a prebuilt workflow described by a YAML config
//! file. Exit code 0 on success, 1 on any failure with a stderr summary
//! naming the failing node where applicable.

mod agent;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use flowgraph_core::{EngineConfig, GraphEngine, WorkflowStatus};
use flowgraph_dispatch::github::{GitHubIssueClient, GitHubProjectClient};
use flowgraph_dispatch::{DispatchConfig, DispatchResolver, SourceType};
use flowgraph_nodes::providers::default_registry;
use flowgraph_prebuilt::{
    dispatch_workflow, issue_processor, IssueProcessorDeps, IssueProcessorOptions,
};
use flowgraph_store::FileStateStore;

use agent::LlmAgentProvider;
use config::{WorkflowFile, WorkflowKind};

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Parser)]
#[command(name = "flowgraph")]
#[command(about = "Run a flowgraph workflow", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the workflow-config YAML file
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(error) = run(&cli).await {
        eprintln!("flowgraph: {error:#}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let file = WorkflowFile::load(&cli.config)?;
    let store = Arc::new(FileStateStore::new(file.state_dir()));
    let engine_config = EngineConfig::default().with_max_retries(file.max_retries());

    let (workflow, run_id) = match file.workflow {
        WorkflowKind::Dispatch => {
            let config = DispatchConfig::from_env()?;
            let issues = Arc::new(GitHubIssueClient::new(config.token.clone()));
            let project = match config.source {
                SourceType::Project => {
                    let owner = config
                        .project_owner
                        .clone()
                        .context("project owner missing")?;
                    let number = config.project_number.context("project number missing")?;
                    Some(Arc::new(GitHubProjectClient::new(
                        config.token.clone(),
                        owner,
                        number,
                        config.priority_field.clone(),
                    )) as Arc<dyn flowgraph_dispatch::ProjectClient>)
                }
                SourceType::Label => None,
            };
            let resolver = Arc::new(DispatchResolver::new(issues, project, config));
            let run_id = file.run_id.clone().unwrap_or_else(|| "dispatch".to_string());
            (dispatch_workflow(resolver), run_id)
        }
        WorkflowKind::IssueProcessor => {
            let repository = require_env("GITHUB_REPOSITORY")?;
            let issue_number: u64 = require_env("GRAPH_ISSUE_NUMBER")?
                .parse()
                .context("GRAPH_ISSUE_NUMBER must be numeric")?;

            let mut options = IssueProcessorOptions::new(repository, issue_number);
            if let Ok(title) = std::env::var("GRAPH_ISSUE_TITLE") {
                options.issue_title = title;
            }
            if let Ok(body) = std::env::var("GRAPH_ISSUE_BODY") {
                options.issue_body = body;
            }
            if let Ok(branch) = std::env::var("GRAPH_BASE_BRANCH") {
                options.base_branch = branch;
            }
            if let Ok(status) = std::env::var("GRAPH_DONE_STATUS") {
                options.done_status = status;
            }
            if let Ok(url) = std::env::var("GITHUB_RUN_URL") {
                options.actions_run_url = Some(url);
            }
            options.project_owner = std::env::var("GRAPH_PROJECT_OWNER").ok();
            options.project_number = std::env::var("GRAPH_PROJECT_NUMBER")
                .ok()
                .and_then(|s| s.parse().ok());

            let registry = Arc::new(default_registry());
            let model = file.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
            let project = match (&options.project_owner, options.project_number) {
                (Some(owner), Some(number)) => {
                    let token = require_env("GITHUB_TOKEN")?;
                    Some(Arc::new(GitHubProjectClient::new(
                        token,
                        owner.clone(),
                        number,
                        "Priority".to_string(),
                    )) as Arc<dyn flowgraph_dispatch::ProjectClient>)
                }
                _ => None,
            };
            let deps = IssueProcessorDeps {
                agent: Arc::new(LlmAgentProvider::new(registry, model)),
                project,
            };

            let run_id = file
                .run_id
                .clone()
                .unwrap_or_else(|| format!("issue-{issue_number}"));
            (issue_processor(options, deps), run_id)
        }
    };

    let engine = GraphEngine::new(workflow, store, engine_config)?;
    let state = engine.run(&run_id).await?;

    if state.status != WorkflowStatus::Completed {
        anyhow::bail!("run '{run_id}' finished with status {:?}", state.status);
    }
    tracing::info!(run_id = %run_id, "workflow completed");
    Ok(())
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .with_context(|| format!("{name} is required"))
}
