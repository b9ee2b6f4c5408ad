//! The graph engine main loop
//!
//! [`GraphEngine`] owns a validated node table, a state store, and a retry
//! budget. `run` follows the step protocol: load-or-init, execute, merge,
//! resolve, advance, persist - looping until the state reaches a terminal
//! sentinel. The engine never issues overlapping executes; a run is one
//! cooperative single-threaded chain.
//!
//! # Retry policy
//!
//! A failing execute is retried up to `max_retries` additional times with
//! no backoff, each attempt logged with node name and attempt number. On
//! final failure the engine persists `status=failed, current_node=ERROR`
//! *before* surfacing the error, so the on-disk record always reflects the
//! outcome.
//!
//! # Resumption
//!
//! If a snapshot exists for the run id it is adopted wholesale and the
//! loop picks up at its `current_node`; already-executed nodes are not
//! replayed. Running the engine again on a terminal snapshot returns it
//! unchanged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};

use flowgraph_store::StateStore;

use crate::error::{EngineError, Result};
use crate::node::{EngineContext, NodeRuntime};
use crate::schema::WorkflowConfig;
use crate::state::{WorkflowState, WorkflowStatus, END, ERROR};
use crate::transition::{is_sentinel, resolve_transition};

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Additional attempts after a failed execute. Default 0.
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_retries: 0 }
    }
}

impl EngineConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Executor for one workflow definition
///
/// Construction validates the [`WorkflowConfig`]; a config that fails any
/// validation layer never produces an engine.
pub struct GraphEngine {
    workflow_id: String,
    entry: String,
    nodes: HashMap<String, Arc<dyn NodeRuntime>>,
    schema_names: std::collections::BTreeSet<String>,
    initial_context: Map<String, Value>,
    store: Arc<dyn StateStore>,
    config: EngineConfig,
}

impl GraphEngine {
    /// Validate `workflow` and build an engine over `store`.
    pub fn new(
        workflow: WorkflowConfig,
        store: Arc<dyn StateStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        workflow.validate()?;
        let entry = workflow
            .entry()
            .expect("validated workflow has an entry node")
            .to_string();

        let mut nodes = HashMap::with_capacity(workflow.nodes.len());
        for node in &workflow.nodes {
            nodes.insert(node.name().to_string(), Arc::clone(node));
        }

        Ok(Self {
            workflow_id: workflow.id,
            entry,
            nodes,
            schema_names: workflow.schema_names,
            initial_context: workflow.initial_context,
            store,
            config,
        })
    }

    /// The entry node name.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Execute the workflow for `run_id` until it terminates.
    ///
    /// Adopts a prior snapshot when one exists; otherwise starts fresh at
    /// the entry node with the workflow's initial context.
    pub async fn run(&self, run_id: &str) -> Result<WorkflowState> {
        let mut state = self.load_or_init(run_id).await?;

        if state.is_terminal() {
            tracing::info!(
                workflow = %self.workflow_id,
                run_id = %run_id,
                node = %state.current_node,
                "run already terminal, nothing to do"
            );
            return Ok(state);
        }
        if state.status == WorkflowStatus::Pending {
            state.status = WorkflowStatus::Running;
        }
        // Reserved, engine-managed key: nodes key artifacts (dashboard
        // markers) off the run id without seeing the store.
        state.context.insert(
            "__runId".to_string(),
            Value::String(run_id.to_string()),
        );

        let ctx = EngineContext::new(run_id);
        tracing::info!(
            workflow = %self.workflow_id,
            run_id = %run_id,
            entry = %state.current_node,
            "starting workflow execution"
        );

        while !is_sentinel(&state.current_node) && state.status == WorkflowStatus::Running {
            let name = state.current_node.clone();
            let node = match self.nodes.get(&name) {
                Some(node) => Arc::clone(node),
                None => {
                    self.fail(run_id, &mut state).await?;
                    return Err(EngineError::UnknownNode { node: name });
                }
            };

            let started = Instant::now();
            tracing::info!(node = %name, kind = %node.kind(), "node start");

            let outcome = match self.execute_with_retry(node.as_ref(), &state, &ctx).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(node = %name, kind = %node.kind(), error = %err, "node failed");
                    self.fail(run_id, &mut state).await?;
                    return Err(err);
                }
            };

            state.apply(outcome.delta);
            tracing::info!(
                node = %name,
                kind = %node.kind(),
                duration_ms = started.elapsed().as_millis() as u64,
                "node complete"
            );

            let next = match resolve_transition(&name, node.transition(), &state, &self.schema_names)
            {
                Ok(next) => next,
                Err(err) => {
                    tracing::error!(node = %name, error = %err, "transition rejected");
                    self.fail(run_id, &mut state).await?;
                    return Err(err);
                }
            };

            tracing::debug!(from = %name, to = %next, "advancing");
            state.current_node = next;
            if state.current_node == END {
                state.status = WorkflowStatus::Completed;
            } else if state.current_node == ERROR {
                state.status = WorkflowStatus::Failed;
            }
            state.touch();
            self.persist(run_id, &state).await?;
        }

        tracing::info!(
            workflow = %self.workflow_id,
            run_id = %run_id,
            status = ?state.status,
            "workflow finished"
        );
        Ok(state)
    }

    async fn load_or_init(&self, run_id: &str) -> Result<WorkflowState> {
        if let Some(snapshot) = self.store.load(run_id).await? {
            match serde_json::from_value::<WorkflowState>(snapshot) {
                Ok(state) => {
                    tracing::info!(
                        run_id = %run_id,
                        node = %state.current_node,
                        "resuming from snapshot"
                    );
                    return Ok(state);
                }
                Err(e) => {
                    tracing::warn!(run_id = %run_id, error = %e, "snapshot has unexpected shape, starting fresh");
                }
            }
        }
        Ok(WorkflowState::with_context(
            &self.entry,
            self.initial_context.clone(),
        ))
    }

    async fn execute_with_retry(
        &self,
        node: &dyn NodeRuntime,
        state: &WorkflowState,
        ctx: &EngineContext,
    ) -> Result<crate::node::NodeOutcome> {
        let attempts = self.config.max_retries + 1;
        let mut last_err = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tracing::warn!(
                    node = %node.name(),
                    attempt,
                    max_attempts = attempts,
                    "retrying node execution"
                );
            }
            match node.execute(state, ctx).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    tracing::warn!(
                        node = %node.name(),
                        kind = %node.kind(),
                        attempt,
                        error = %err,
                        "node execution attempt failed"
                    );
                    last_err = Some(err);
                }
            }
        }

        // Attach node context where the node's own error lacks it.
        Err(match last_err.expect("at least one attempt ran") {
            err @ EngineError::NodeExecution { .. } => err,
            err @ EngineError::Timeout { .. } => err,
            other => EngineError::node_execution(node.name(), node.kind(), other.to_string()),
        })
    }

    async fn fail(&self, run_id: &str, state: &mut WorkflowState) -> Result<()> {
        state.status = WorkflowStatus::Failed;
        state.current_node = ERROR.to_string();
        state.touch();
        self.persist(run_id, state).await
    }

    async fn persist(&self, run_id: &str, state: &WorkflowState) -> Result<()> {
        let snapshot = serde_json::to_value(state)?;
        self.store.save(run_id, &snapshot).await?;
        Ok(())
    }
}

impl std::fmt::Debug for GraphEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphEngine")
            .field("workflow_id", &self.workflow_id)
            .field("entry", &self.entry)
            .field("nodes", &self.nodes.len())
            .field("max_retries", &self.config.max_retries)
            .finish()
    }
}
