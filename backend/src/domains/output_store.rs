use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unable to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Directories handed to a single job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobWorkspace {
    /// Blender writes here and the artifact resolver scans only this directory.
    pub output_dir: PathBuf,
    /// Control script location, never inside `output_dir`.
    pub script_path: PathBuf,
}

#[async_trait::async_trait]
pub trait OutputStore: Send + Sync {
    /// Create (if needed) and return the workspace of `job_id`. Safe to call concurrently.
    async fn allocate(&self, job_id: &Uuid) -> Result<JobWorkspace, StorageError>;
}
