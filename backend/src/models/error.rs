use crate::domains::{output_store::StorageError, scene_store::SceneError};
use blender::{artifact::ArtifactError, blender::BlenderError, models::format::Format};
use serde::ser::SerializeStruct;
use std::time::Duration;
use thiserror::Error;

/// Every way a render request can fail. None of them are retried.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Unsupported file format \"{0}\". Supported formats: PNG, JPEG, TIFF, BMP, OPEN_EXR, HDR, MP4, AVI")]
    UnsupportedFormat(String),
    #[error("{0} is a video format and cannot be used for a still image")]
    IncompatibleFormat(Format),
    #[error("Invalid output name \"{0}\": use 1-64 letters, digits, '-' or '_' followed by an extension")]
    InvalidOutputName(String),
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
    #[error("Blend file not found: {0}")]
    SceneNotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Unable to start the render engine: {0}")]
    SpawnError(String),
    #[error("Render failed with exit code {exit_code:?}")]
    EngineFailure {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("Render did not finish within {0:?}")]
    EngineTimeout(Duration),
    #[error("Render failed: output file not found. {0}")]
    ArtifactNotFound(String),
}

impl RenderError {
    /// Stable machine readable code for callers.
    pub fn reason(&self) -> &'static str {
        match self {
            RenderError::UnsupportedFormat(_) => "unsupported_format",
            RenderError::IncompatibleFormat(_) => "incompatible_format",
            RenderError::InvalidOutputName(_) => "invalid_output_name",
            RenderError::InvalidFrame(_) => "invalid_frame",
            RenderError::SceneNotFound(_) => "scene_not_found",
            RenderError::Storage(_) => "storage_error",
            RenderError::SpawnError(_) => "spawn_error",
            RenderError::EngineFailure { .. } => "engine_failure",
            RenderError::EngineTimeout(_) => "engine_timeout",
            RenderError::ArtifactNotFound(_) => "artifact_not_found",
        }
    }

    /// Rejected before anything was spawned.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RenderError::UnsupportedFormat(_)
                | RenderError::IncompatibleFormat(_)
                | RenderError::InvalidOutputName(_)
                | RenderError::InvalidFrame(_)
                | RenderError::SceneNotFound(_)
        )
    }

    /// HTTP status an outer transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            RenderError::SceneNotFound(_) => 404,
            e if e.is_validation() => 400,
            _ => 500,
        }
    }
}

impl From<BlenderError> for RenderError {
    fn from(err: BlenderError) -> Self {
        match err {
            BlenderError::Spawn { .. } | BlenderError::Version(_) => {
                RenderError::SpawnError(err.to_string())
            }
            BlenderError::Script { .. } => RenderError::Storage(err.to_string()),
            BlenderError::Failure { exit_code, stderr } => {
                RenderError::EngineFailure { exit_code, stderr }
            }
            BlenderError::Timeout(limit) => RenderError::EngineTimeout(limit),
            BlenderError::Io(e) => RenderError::EngineFailure {
                exit_code: None,
                stderr: e.to_string(),
            },
        }
    }
}

impl From<ArtifactError> for RenderError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Io(_) => RenderError::Storage(err.to_string()),
            _ => RenderError::ArtifactNotFound(err.to_string()),
        }
    }
}

impl From<SceneError> for RenderError {
    fn from(err: SceneError) -> Self {
        match err {
            SceneError::Io(_) => RenderError::Storage(err.to_string()),
            SceneError::NotFound(name) | SceneError::InvalidName(name) => {
                RenderError::SceneNotFound(name)
            }
        }
    }
}

impl From<StorageError> for RenderError {
    fn from(err: StorageError) -> Self {
        RenderError::Storage(err.to_string())
    }
}

// Engine diagnostics stay in the logs, callers only get the reason and the message.
impl serde::Serialize for RenderError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("RenderError", 3)?;
        state.serialize_field("reason", self.reason())?;
        state.serialize_field("status", &self.status_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
