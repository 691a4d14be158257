use crate::domains::output_store::JobWorkspace;
use blender::models::{
    args::Args, format::Format, mode::Mode, render_setting::RenderSetting,
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};
use uuid::Uuid;

/// Where the blend file of a request comes from.
#[derive(Clone, PartialEq)]
pub enum SceneSource {
    /// Name of a blend file already present in the scene store.
    Stored(String),
    /// Blend file sent along with the request.
    Inline { file_name: String, data: Vec<u8> },
}

impl fmt::Debug for SceneSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneSource::Stored(name) => f.debug_tuple("Stored").field(name).finish(),
            SceneSource::Inline { file_name, data } => f
                .debug_struct("Inline")
                .field("file_name", file_name)
                .field("bytes", &data.len())
                .finish(),
        }
    }
}

/// Frames as they arrive, before defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    Still { frame: Option<i32> },
    Animation { start: Option<i32>, end: Option<i32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub scene: SceneSource,
    pub frames: FrameRequest,
    /// Requested output file name, e.g. "out.png". The extension selects the format.
    pub output_name: String,
}

impl RenderRequest {
    pub fn image(scene: SceneSource, frame: Option<i32>, output_name: impl Into<String>) -> Self {
        Self {
            scene,
            frames: FrameRequest::Still { frame },
            output_name: output_name.into(),
        }
    }

    pub fn animation(
        scene: SceneSource,
        start: Option<i32>,
        end: Option<i32>,
        output_name: impl Into<String>,
    ) -> Self {
        Self {
            scene,
            frames: FrameRequest::Animation { start, end },
            output_name: output_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    StillImage { frame: i32 },
    /// `end: None` renders up to the end frame stored in the scene.
    Animation { start: i32, end: Option<i32> },
}

impl JobKind {
    pub fn mode(&self) -> Mode {
        match *self {
            JobKind::StillImage { frame } => Mode::Frame(frame),
            JobKind::Animation { start, end } => Mode::Animation { start, end },
        }
    }
}

/// Validated, normalized job. Built once per request and consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: Uuid,
    pub scene_path: PathBuf,
    pub kind: JobKind,
    pub format: Format,
    /// Requested file name without its extension, used as the render output stem.
    pub output_base_name: String,
    /// Requested file name as sent by the caller.
    pub file_name: String,
    pub workspace: JobWorkspace,
}

impl JobSpec {
    /// Path stem handed to blender; frame numbers and extension are appended by blender.
    pub fn output_stem(&self) -> PathBuf {
        self.workspace.output_dir.join(&self.output_base_name)
    }

    pub fn to_args(&self, settings: &RenderSetting, autoexec: bool) -> Args {
        Args::new(
            &self.scene_path,
            self.output_stem(),
            self.kind.mode(),
            self.format,
            &self.workspace.script_path,
        )
        .with_settings(settings.clone())
        .with_autoexec(autoexec)
    }
}
