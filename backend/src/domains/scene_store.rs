use std::{
    io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Blend file not found: {0}")]
    NotFound(String),
    #[error("Invalid blend file name: {0}")]
    InvalidName(String),
    #[error("Scene store IO error: {0}")]
    Io(#[from] io::Error),
}

/// Where blend files come from: a pre-populated directory, or an upload attached to the request.
#[async_trait::async_trait]
pub trait SceneStore: Send + Sync {
    /// Map a stored scene name to its path. Does not check that the file exists.
    fn resolve(&self, name: &str) -> Result<PathBuf, SceneError>;
    /// Persist an uploaded scene for one job and return where it was written.
    async fn stage(&self, job_id: &Uuid, file_name: &str, data: &[u8])
        -> Result<PathBuf, SceneError>;
    async fn exists(&self, path: &Path) -> bool;
    async fn read(&self, path: &Path) -> Result<Vec<u8>, SceneError>;
    /// Drop whatever was staged for `job_id`. Succeeds when nothing was staged.
    async fn release(&self, job_id: &Uuid) -> Result<(), SceneError>;
}

/// Accept only a plain file name: one normal path component, no separators.
pub fn check_file_name(name: &str) -> Result<&str, SceneError> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || name.contains(['/', '\\']) {
        return Err(SceneError::InvalidName(name.to_owned()));
    }
    Ok(name)
}
