//! Core graph execution engine for flowgraph
//!
//! flowgraph executes declarative workflows: directed graphs of
//! heterogeneous work steps ("nodes") threaded through a persistable,
//! per-run state. Each engine step loads the state, executes the node named
//! by `current_node`, shallow-merges the returned delta, persists a
//! snapshot, then resolves the next node from the node's transition - a
//! literal successor or a predicate over the post-execution state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  GraphEngine::run(run_id)                                │
//! │                                                          │
//! │  load snapshot ──► adopt (resume) or init fresh state    │
//! │        │                                                 │
//! │        ▼                                                 │
//! │  ┌─ loop while current_node ∉ {END, ERROR} ───────────┐  │
//! │  │  look up node ── execute (retry on failure)        │  │
//! │  │        │                                           │  │
//! │  │  merge StateDelta ── refresh updated_at            │  │
//! │  │        │                                           │  │
//! │  │  resolve transition ── advance current_node        │  │
//! │  │        │                                           │  │
//! │  │  persist snapshot                                  │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │        │                                                 │
//! │        ▼                                                 │
//! │  final WorkflowState (completed or failed)               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A run is single-threaded by design: nodes execute strictly in sequence
//! and each `execute` observes the merged result of every preceding node.
//! Suspension only happens inside a node's own I/O (subprocess wait, HTTP
//! request, provider call).
//!
//! # Crate layout
//!
//! - [`state`] - [`WorkflowState`], [`StateDelta`], terminal sentinels
//! - [`transition`] - literal/predicate transitions and runtime validation
//! - [`node`] - the [`NodeRuntime`] contract every node kind implements
//! - [`schema`] - declarative [`WorkflowConfig`] plus the three-layer
//!   load-time validation
//! - [`engine`] - the [`GraphEngine`] main loop with retry and persistence
//! - [`error`] - the [`EngineError`] taxonomy

pub mod engine;
pub mod error;
pub mod node;
pub mod schema;
pub mod state;
pub mod transition;

pub use engine::{EngineConfig, GraphEngine};
pub use error::{EngineError, Result};
pub use node::{EngineContext, NodeKind, NodeOutcome, NodeRuntime};
pub use schema::{ValidationReport, WorkflowConfig};
pub use state::{StateDelta, WorkflowState, WorkflowStatus, END, ERROR};
pub use transition::{is_sentinel, resolve_transition, Transition};
