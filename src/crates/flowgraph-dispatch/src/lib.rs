//! Issue dispatch dependency resolver
//!
//! Turns a pile of tracker issues into an ordered dispatch plan:
//!
//! ```text
//! fetch (label | project)
//!   └─► sub-issue population (per-issue soft failure)
//!         └─► resolve: dependencies, blocked-by, READY/BLOCKED/CLOSED, leaf
//!               └─► priority extraction (project field, labels)
//!                     └─► DAG keyed owner/repo#number
//!                           └─► cycle detection (warnings, not fatal)
//!                                 └─► ready/blocked partition
//!                                       └─► matrix emission
//! ```
//!
//! Dependencies come exclusively from the tracker's sub-issue edge: an
//! issue's sub-issues are its dependencies, the open ones block it, and
//! only *leaf* issues (no sub-issues) are ever dispatched - a non-leaf
//! issue is an aggregator. Cycles suppress their participants from the
//! ready set but never abort the run.
//!
//! All cross-references travel as `owner/repo#number` id strings, which
//! keeps ownership acyclic and serializes cleanly.

pub mod config;
pub mod dag;
pub mod error;
pub mod github;
pub mod matrix;
pub mod nodes;
pub mod priority;
pub mod resolve;
pub mod tracker;
pub mod types;

pub use config::{DispatchConfig, SourceType};
pub use dag::{build_dag, detect_cycles, DependencyGraph};
pub use error::{DispatchError, ProjectsError};
pub use matrix::{build_matrix, emit_matrix, partition};
pub use priority::extract_priority;
pub use resolve::{resolve_issues, DispatchOutcome, DispatchResolver};
pub use tracker::{IssueClient, ProjectClient, SubIssueRef};
pub use types::{
    CycleInfo, DagNode, DependencyRef, DispatchMatrix, IssueState, MatrixEntry, Priority,
    QueuedIssue, ResolutionStatus, ResolvedIssue,
};
