//! Run-state persistence for flowgraph workflows
//!
//! Every workflow run owns at most one persisted snapshot, keyed by run id.
//! The engine writes a snapshot after each node step and reads it back on
//! start to resume interrupted runs. This crate defines the storage
//! abstraction - [`StateStore`] - plus two backends:
//!
//! - [`FileStateStore`] - one JSON file per run under a state directory,
//!   written atomically (temp file + rename) so an external reader always
//!   sees a complete prior state.
//! - [`MemoryStateStore`] - thread-safe in-memory map for tests and
//!   short-lived embedded use.
//!
//! # Snapshot contract
//!
//! Snapshots are opaque JSON values here; the engine owns their shape.
//! Three laws the backends uphold:
//!
//! - `save(id, s)` then `load(id)` returns a value equal to `s`.
//! - `load` of a missing *or unparsable* snapshot returns `None` without
//!   erroring, so one corrupt file can never block fresh runs.
//! - Run ids are sanitized to `[A-Za-z0-9_-]` before touching the
//!   filesystem; `sanitize(sanitize(id)) == sanitize(id)`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use flowgraph_store::{FileStateStore, StateStore};
//! use serde_json::json;
//!
//! # async fn demo() -> flowgraph_store::Result<()> {
//! let store = FileStateStore::new(".flowgraph/state");
//! store.save("run-42", &json!({"currentNode": "PLAN"})).await?;
//!
//! let snapshot = store.load("run-42").await?;
//! assert!(snapshot.is_some());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use file::{sanitize_run_id, FileStateStore};
pub use memory::MemoryStateStore;
pub use traits::StateStore;
