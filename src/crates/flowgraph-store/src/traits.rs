//! Storage trait for run snapshots
//!
//! [`StateStore`] is the seam between the graph engine and whatever holds
//! the per-run JSON snapshots. Implement it to back runs with a database or
//! object store; the crate ships filesystem and in-memory implementations.
//!
//! Implementations must keep at most one snapshot per run id (`save`
//! replaces wholesale) and must tolerate corrupt or missing data on `load`
//! by returning `None`.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Persistence backend for workflow run snapshots
///
/// Concurrent saves to *distinct* ids must be safe. Saves to the same id
/// are not serialized by the store; the engine guarantees a single writer
/// per run.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persist the snapshot for `run_id`, replacing any prior snapshot.
    ///
    /// The write must be atomic: a concurrent reader sees either the old
    /// complete snapshot or the new one, never a partial write.
    async fn save(&self, run_id: &str, snapshot: &Value) -> Result<()>;

    /// Load the snapshot for `run_id`.
    ///
    /// Returns `None` when no snapshot exists *or* when the stored bytes
    /// fail to parse. A corrupt snapshot must not surface as an error.
    async fn load(&self, run_id: &str) -> Result<Option<Value>>;

    /// Remove the snapshot for `run_id`. Missing snapshots are not an error.
    async fn delete(&self, run_id: &str) -> Result<()>;

    /// List the run ids with a stored snapshot. Empty when the backing
    /// location does not exist yet.
    async fn list(&self) -> Result<Vec<String>>;
}
