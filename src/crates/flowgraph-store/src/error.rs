//! Error types for state-store operations

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while persisting or listing run snapshots
///
/// Note that `load` never fails on a corrupt snapshot - corruption is
/// reported as "absent" by design. These errors cover the remaining
/// failure surface: filesystem problems and unserializable values.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A run id sanitized down to the empty string
    #[error("Invalid run id: {0:?}")]
    InvalidRunId(String),

    /// Snapshot could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
