use crate::domains::output_store::{JobWorkspace, OutputStore, StorageError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Per-job output directories under `render_dir`, control scripts under `script_dir`.
#[derive(Debug, Clone)]
pub struct FsOutputStore {
    render_dir: PathBuf,
    script_dir: PathBuf,
}

impl FsOutputStore {
    pub fn new(render_dir: impl AsRef<Path>, script_dir: impl AsRef<Path>) -> Self {
        Self {
            render_dir: render_dir.as_ref().to_path_buf(),
            script_dir: script_dir.as_ref().to_path_buf(),
        }
    }

    /// Workspace paths for `job_id`, without touching the filesystem.
    pub fn workspace(&self, job_id: &Uuid) -> JobWorkspace {
        JobWorkspace {
            output_dir: self.render_dir.join(job_id.to_string()),
            script_path: self.script_dir.join(format!("{job_id}.py")),
        }
    }
}

async fn ensure_dir(path: &Path) -> Result<(), StorageError> {
    // create_dir_all treats a directory created concurrently by another job as success
    fs::create_dir_all(path)
        .await
        .map_err(|source| StorageError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
}

#[async_trait::async_trait]
impl OutputStore for FsOutputStore {
    async fn allocate(&self, job_id: &Uuid) -> Result<JobWorkspace, StorageError> {
        let workspace = self.workspace(job_id);
        ensure_dir(&workspace.output_dir).await?;
        ensure_dir(&self.script_dir).await?;
        debug!(job_id = %job_id, output_dir = %workspace.output_dir.display(), "Allocated job workspace");
        Ok(workspace)
    }
}
