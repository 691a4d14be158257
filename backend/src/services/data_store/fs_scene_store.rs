use crate::domains::scene_store::{check_file_name, SceneError, SceneStore};
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Scene store backed by a directory of blend files.
/// Uploads land in `<root>/<job id>/<file name>` so two jobs never share an upload.
#[derive(Debug, Clone)]
pub struct FsSceneStore {
    root: PathBuf,
}

impl FsSceneStore {
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait::async_trait]
impl SceneStore for FsSceneStore {
    fn resolve(&self, name: &str) -> Result<PathBuf, SceneError> {
        let name = check_file_name(name)?;
        Ok(self.root.join(name))
    }

    async fn stage(
        &self,
        job_id: &Uuid,
        file_name: &str,
        data: &[u8],
    ) -> Result<PathBuf, SceneError> {
        let file_name = check_file_name(file_name)?;
        let dir = self.root.join(job_id.to_string());
        fs::create_dir_all(&dir).await?;
        let path = dir.join(file_name);
        fs::write(&path, data).await?;
        debug!(job_id = %job_id, path = %path.display(), bytes = data.len(), "Staged uploaded blend file");
        Ok(path)
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, SceneError> {
        match fs::read(path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SceneError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn release(&self, job_id: &Uuid) -> Result<(), SceneError> {
        let dir = self.root.join(job_id.to_string());
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(job_id = %job_id, path = %dir.display(), "Released staged blend file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
