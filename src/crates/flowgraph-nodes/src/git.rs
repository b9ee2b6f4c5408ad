//! Git checkout nodes
//!
//! Credential resolution is a policy step with no side effects: the node
//! validates that it can produce `{owner, repo, token}` - from explicit
//! configuration plus an environment token, or through a
//! [`CredentialResolver`] fed by the issue context - *before* any process
//! is spawned. Only then does it clone (shallow by default) with an
//! access-token URL, optionally check out a ref, and read the HEAD sha.
//!
//! When the work directory already exists and `skip_if_exists` is on
//! (default) the clone is skipped and the existing HEAD is read instead.
//!
//! The checkout record lands under `lastCheckoutResult` and the work
//! directory is mirrored at the canonical `workDir` context key for
//! downstream nodes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use flowgraph_core::{
    EngineContext, EngineError, NodeKind, NodeOutcome, NodeRuntime, Result, StateDelta, Transition,
    WorkflowState,
};

use crate::command::{run_command, CommandSpec};
use crate::result::{keys, CheckoutResult};

/// Default git clone timeout: 120 seconds.
pub const DEFAULT_CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Resolved clone credentials.
#[derive(Clone)]
pub struct CheckoutCredentials {
    pub owner: String,
    pub repo: String,
    pub token: String,
}

impl std::fmt::Debug for CheckoutCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Token never appears in Debug output.
        f.debug_struct("CheckoutCredentials")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Issue-context credential channel: look up the issue's project and its
/// token from the run state. Implemented by the tracker integration.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, state: &WorkflowState) -> Result<CheckoutCredentials>;
}

/// How the node obtains credentials.
#[derive(Clone)]
pub enum CheckoutAuth {
    /// Explicit owner/repo; token read from an environment variable.
    Explicit {
        owner: String,
        repo: String,
        token_env: String,
    },
    /// Resolved from the issue context at execution time.
    IssueContext(Arc<dyn CredentialResolver>),
}

/// Clone-and-checkout node
pub struct GitCheckoutNode {
    name: String,
    auth: CheckoutAuth,
    reference: Option<String>,
    depth: Option<u32>,
    skip_if_exists: bool,
    work_root: PathBuf,
    clone_timeout: Duration,
    result_key: String,
    then: Transition,
}

impl GitCheckoutNode {
    pub fn new(
        name: impl Into<String>,
        auth: CheckoutAuth,
        work_root: impl Into<PathBuf>,
        then: Transition,
    ) -> Self {
        Self {
            name: name.into(),
            auth,
            reference: None,
            depth: Some(1),
            skip_if_exists: true,
            work_root: work_root.into(),
            clone_timeout: DEFAULT_CLONE_TIMEOUT,
            result_key: keys::LAST_CHECKOUT_RESULT.to_string(),
            then,
        }
    }

    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// `None` disables the shallow clone.
    pub fn with_depth(mut self, depth: Option<u32>) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_skip_if_exists(mut self, skip: bool) -> Self {
        self.skip_if_exists = skip;
        self
    }

    pub fn with_clone_timeout(mut self, timeout: Duration) -> Self {
        self.clone_timeout = timeout;
        self
    }

    async fn credentials(&self, state: &WorkflowState) -> Result<CheckoutCredentials> {
        match &self.auth {
            CheckoutAuth::Explicit {
                owner,
                repo,
                token_env,
            } => {
                let token = std::env::var(token_env).map_err(|_| {
                    EngineError::config(format!(
                        "checkout node '{}': environment variable {token_env} is not set",
                        self.name
                    ))
                })?;
                Ok(CheckoutCredentials {
                    owner: owner.clone(),
                    repo: repo.clone(),
                    token,
                })
            }
            CheckoutAuth::IssueContext(resolver) => resolver.resolve(state).await,
        }
    }

    /// Run one git command. `redact` scrubs the access token from any
    /// surfaced error text (git prints the clone URL on failure).
    async fn git(
        &self,
        argv: Vec<String>,
        cwd: Option<&PathBuf>,
        redact: Option<&str>,
    ) -> Result<String> {
        let scrub = |text: String| match redact {
            Some(secret) if !secret.is_empty() => text.replace(secret, "***"),
            _ => text,
        };

        let spec = CommandSpec::Argv(argv);
        let result = match run_command(&spec, cwd, &Default::default(), self.clone_timeout).await {
            Ok(result) => result,
            Err(EngineError::Timeout {
                operation,
                duration_ms,
            }) => {
                return Err(EngineError::Timeout {
                    operation: scrub(operation),
                    duration_ms,
                })
            }
            Err(err) => return Err(err),
        };
        if !result.success {
            return Err(EngineError::node_execution(
                &self.name,
                NodeKind::GitCheckout,
                scrub(format!("git failed: {}", result.stderr)),
            ));
        }
        Ok(result.stdout)
    }
}

#[async_trait]
impl NodeRuntime for GitCheckoutNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::GitCheckout
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    fn validate(&self) -> Result<()> {
        if let CheckoutAuth::Explicit {
            owner,
            repo,
            token_env,
        } = &self.auth
        {
            if owner.is_empty() || repo.is_empty() || token_env.is_empty() {
                return Err(EngineError::config(format!(
                    "checkout node '{}' requires owner, repo and token_env",
                    self.name
                )));
            }
        }
        Ok(())
    }

    async fn execute(&self, state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        // Side-effect-free policy step first.
        let creds = self.credentials(state).await?;
        let work_dir = self
            .work_root
            .join(format!("{}-{}", creds.owner, creds.repo));

        let reused = work_dir.is_dir() && self.skip_if_exists;
        if reused {
            tracing::info!(node = %self.name, dir = %work_dir.display(), "reusing existing checkout");
        } else {
            tokio::fs::create_dir_all(&self.work_root).await?;
            let clone_url = format!(
                "https://x-access-token:{}@github.com/{}/{}.git",
                creds.token, creds.owner, creds.repo
            );
            let mut argv = vec!["git".to_string(), "clone".to_string()];
            if let Some(depth) = self.depth {
                argv.push("--depth".to_string());
                argv.push(depth.to_string());
            }
            argv.push(clone_url);
            argv.push(work_dir.to_string_lossy().to_string());
            self.git(argv, None, Some(&creds.token)).await?;

            if let Some(reference) = &self.reference {
                self.git(
                    vec!["git".to_string(), "checkout".to_string(), reference.clone()],
                    Some(&work_dir),
                    None,
                )
                .await?;
            }
        }

        let sha = self
            .git(
                vec![
                    "git".to_string(),
                    "rev-parse".to_string(),
                    "HEAD".to_string(),
                ],
                Some(&work_dir),
                None,
            )
            .await?;

        let result = CheckoutResult {
            work_dir: work_dir.to_string_lossy().to_string(),
            owner: creds.owner,
            repo: creds.repo,
            reference: self.reference.clone(),
            sha,
        };

        let delta = StateDelta::new()
            .with_context(self.result_key.clone(), serde_json::to_value(&result)?)
            .with_context(keys::WORK_DIR, Value::String(result.work_dir.clone()));
        Ok(NodeOutcome::from_delta(delta))
    }
}
