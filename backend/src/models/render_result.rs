use super::job::JobSpec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    pub job_id: Uuid,
    pub artifact_path: PathBuf,
    pub media_type: String,
    /// Name the artifact should be delivered under.
    pub file_name: String,
}

impl RenderResult {
    pub fn new(spec: &JobSpec, artifact_path: PathBuf) -> Self {
        Self {
            job_id: spec.id,
            artifact_path,
            media_type: spec.format.media_type().to_owned(),
            file_name: spec.file_name.clone(),
        }
    }
}
