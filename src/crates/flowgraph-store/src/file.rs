//! File-backed state store
//!
//! One `<state_dir>/<sanitized-id>.json` file per run. Writes go through a
//! temp file in the same directory followed by a rename, so readers never
//! observe a torn snapshot. Loads are tolerant: missing files and parse
//! failures both come back as `None`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;

use crate::error::{Result, StoreError};
use crate::traits::StateStore;

/// Strip every character outside `[A-Za-z0-9_-]` from a run id.
///
/// Idempotent: sanitizing an already-sanitized id is a no-op.
pub fn sanitize_run_id(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Filesystem-backed [`StateStore`]
///
/// The state directory is created lazily on first save.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Create a store rooted at `dir`. Nothing is touched on disk until
    /// the first `save`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory this store writes under.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, run_id: &str) -> Result<PathBuf> {
        let key = sanitize_run_id(run_id);
        if key.is_empty() {
            return Err(StoreError::InvalidRunId(run_id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn save(&self, run_id: &str, snapshot: &Value) -> Result<()> {
        let path = self.path_for(run_id)?;
        fs::create_dir_all(&self.dir).await?;

        let bytes = serde_json::to_vec_pretty(snapshot)?;

        // Write-tmp + rename gives whole-file replace semantics.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!(run_id = %run_id, path = %path.display(), "snapshot saved");
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<Value>> {
        let path = self.path_for(run_id)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // Corrupt snapshots read as absent so a damaged run can
                // never block resumption of fresh ones.
                tracing::warn!(run_id = %run_id, error = %e, "discarding unparsable snapshot");
                Ok(None)
            }
        }
    }

    async fn delete(&self, run_id: &str) -> Result<()> {
        let path = self.path_for(run_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
