use crate::{
    domains::{
        output_store::{JobWorkspace, OutputStore},
        scene_store::SceneStore,
    },
    models::{
        error::RenderError,
        job::{FrameRequest, JobKind, JobSpec, RenderRequest, SceneSource},
    },
};
use blender::models::format::Format;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_OUTPUT_NAME_LEN: usize = 64;
const DEFAULT_FRAME: i32 = 1;

/// Turns raw requests into [`JobSpec`]s. Nothing is spawned here; the only side effects are
/// staging an inline scene and creating the job workspace.
#[derive(Clone)]
pub struct Validator {
    scenes: Arc<dyn SceneStore>,
    outputs: Arc<dyn OutputStore>,
}

impl Validator {
    pub fn new(scenes: Arc<dyn SceneStore>, outputs: Arc<dyn OutputStore>) -> Self {
        Self { scenes, outputs }
    }

    pub async fn validate(&self, request: RenderRequest) -> Result<JobSpec, RenderError> {
        let (format, base_name) = parse_output_name(&request.output_name)?;
        let kind = normalize_frames(request.frames)?;
        check_compatibility(kind, format)?;

        let id = Uuid::new_v4();
        let prepared = self.prepare(&id, &request.scene).await;
        let (scene_path, workspace) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                if matches!(request.scene, SceneSource::Inline { .. }) {
                    self.release_staged(&id).await;
                }
                return Err(e);
            }
        };
        info!(
            job_id = %id,
            scene = %scene_path.display(),
            ?kind,
            %format,
            output = %workspace.output_dir.display(),
            "Validated render job"
        );

        Ok(JobSpec {
            id,
            scene_path,
            kind,
            format,
            output_base_name: base_name.to_owned(),
            file_name: request.output_name,
            workspace,
        })
    }

    /// Remove the scene staged for `spec`, if any. Called once the job is done with it.
    pub async fn release(&self, spec: &JobSpec) {
        self.release_staged(&spec.id).await;
    }

    async fn release_staged(&self, id: &Uuid) {
        if let Err(e) = self.scenes.release(id).await {
            warn!(job_id = %id, error = %e, "Unable to remove staged blend file");
        }
    }

    async fn prepare(
        &self,
        id: &Uuid,
        scene: &SceneSource,
    ) -> Result<(PathBuf, JobWorkspace), RenderError> {
        let scene_path = match scene {
            SceneSource::Stored(name) => self.scenes.resolve(name)?,
            SceneSource::Inline { file_name, data } => {
                self.scenes.stage(id, file_name, data).await?
            }
        };
        if !self.scenes.exists(&scene_path).await {
            debug!(job_id = %id, path = %scene_path.display(), "Blend file missing");
            let name = match scene {
                SceneSource::Stored(name) => name,
                SceneSource::Inline { file_name, .. } => file_name,
            };
            return Err(RenderError::SceneNotFound(name.clone()));
        }

        let workspace = self.outputs.allocate(id).await?;
        Ok((scene_path, workspace))
    }
}

/// Split `name` into its format and base name. The format is checked first, so a name without
/// an extension is reported as an unsupported format.
pub fn parse_output_name(name: &str) -> Result<(Format, &str), RenderError> {
    let Some((base, extension)) = name.rsplit_once('.') else {
        return Err(RenderError::UnsupportedFormat(name.to_owned()));
    };
    let format = Format::from_token(extension)
        .map_err(|_| RenderError::UnsupportedFormat(extension.to_owned()))?;

    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
    if base.is_empty() || base.len() > MAX_OUTPUT_NAME_LEN || !base.chars().all(allowed) {
        return Err(RenderError::InvalidOutputName(name.to_owned()));
    }
    Ok((format, base))
}

pub fn normalize_frames(frames: FrameRequest) -> Result<JobKind, RenderError> {
    match frames {
        FrameRequest::Still { frame } => {
            let frame = frame.unwrap_or(DEFAULT_FRAME);
            if frame < 0 {
                return Err(RenderError::InvalidFrame(format!(
                    "frame {frame} is negative"
                )));
            }
            Ok(JobKind::StillImage { frame })
        }
        FrameRequest::Animation { start, end } => {
            let start = start.unwrap_or(DEFAULT_FRAME);
            if start < 0 {
                return Err(RenderError::InvalidFrame(format!(
                    "start frame {start} is negative"
                )));
            }
            if let Some(end) = end {
                if end < start {
                    return Err(RenderError::InvalidFrame(format!(
                        "end frame {end} is before start frame {start}"
                    )));
                }
            }
            Ok(JobKind::Animation { start, end })
        }
    }
}

/// Video containers need more than one frame, image formats work for both kinds.
pub fn check_compatibility(kind: JobKind, format: Format) -> Result<(), RenderError> {
    match kind {
        JobKind::StillImage { .. } if format.is_video() => {
            Err(RenderError::IncompatibleFormat(format))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::data_store::{
        fs_output_store::FsOutputStore, fs_scene_store::FsSceneStore,
    };
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        validator: Validator,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().expect("temp dir");
        let blend_dir = dir.path().join("blends");
        std::fs::create_dir_all(&blend_dir).unwrap();
        std::fs::write(blend_dir.join("cube.blend"), b"BLENDER").unwrap();

        let scenes = Arc::new(FsSceneStore::new(&blend_dir).unwrap());
        let outputs = Arc::new(FsOutputStore::new(
            dir.path().join("renders"),
            dir.path().join("scripts"),
        ));
        Fixture {
            validator: Validator::new(scenes, outputs),
            dir,
        }
    }

    fn stored(name: &str) -> SceneSource {
        SceneSource::Stored(name.to_owned())
    }

    #[test]
    fn parses_output_names() {
        assert_eq!(parse_output_name("out.png").unwrap(), (Format::PNG, "out"));
        assert_eq!(parse_output_name("shot_01.MP4").unwrap(), (Format::MP4, "shot_01"));
        assert_eq!(parse_output_name("a-b.exr").unwrap_err().reason(), "unsupported_format");
        assert_eq!(parse_output_name("a-b.open_exr").unwrap(), (Format::OPEN_EXR, "a-b"));
        assert_eq!(parse_output_name("still.jpeg").unwrap(), (Format::JPEG, "still"));
    }

    #[test]
    fn rejects_unknown_or_missing_extensions() {
        for name in ["out.gif", "out", "out.", "out.webm"] {
            assert!(
                matches!(parse_output_name(name), Err(RenderError::UnsupportedFormat(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn rejects_unsafe_base_names() {
        let long = format!("{}.png", "a".repeat(65));
        for name in [".png", "../out.png", "a b.png", "out'.png", "a.b.png", "ü.png", long.as_str()] {
            assert!(
                matches!(parse_output_name(name), Err(RenderError::InvalidOutputName(_))),
                "{name}"
            );
        }
        let longest = format!("{}.png", "a".repeat(64));
        assert!(parse_output_name(&longest).is_ok());
    }

    #[test]
    fn normalizes_frames() {
        assert_eq!(
            normalize_frames(FrameRequest::Still { frame: None }).unwrap(),
            JobKind::StillImage { frame: 1 }
        );
        assert_eq!(
            normalize_frames(FrameRequest::Still { frame: Some(0) }).unwrap(),
            JobKind::StillImage { frame: 0 }
        );
        assert_eq!(
            normalize_frames(FrameRequest::Animation { start: None, end: None }).unwrap(),
            JobKind::Animation { start: 1, end: None }
        );
        assert_eq!(
            normalize_frames(FrameRequest::Animation { start: Some(10), end: Some(10) }).unwrap(),
            JobKind::Animation { start: 10, end: Some(10) }
        );
    }

    #[test]
    fn rejects_invalid_frames() {
        let cases = [
            FrameRequest::Still { frame: Some(-1) },
            FrameRequest::Animation { start: Some(-5), end: None },
            FrameRequest::Animation { start: Some(20), end: Some(10) },
        ];
        for frames in cases {
            assert!(
                matches!(normalize_frames(frames), Err(RenderError::InvalidFrame(_))),
                "{frames:?}"
            );
        }
    }

    #[test]
    fn video_requires_animation() {
        let still = JobKind::StillImage { frame: 1 };
        let anim = JobKind::Animation { start: 1, end: None };
        assert!(matches!(
            check_compatibility(still, Format::MP4),
            Err(RenderError::IncompatibleFormat(Format::MP4))
        ));
        assert!(check_compatibility(still, Format::PNG).is_ok());
        assert!(check_compatibility(anim, Format::AVI).is_ok());
        assert!(check_compatibility(anim, Format::PNG).is_ok());
    }

    #[tokio::test]
    async fn builds_job_spec() {
        let fx = fixture();
        let spec = fx
            .validator
            .validate(RenderRequest::image(stored("cube.blend"), Some(5), "out.png"))
            .await
            .unwrap();

        assert_eq!(spec.scene_path, fx.dir.path().join("blends").join("cube.blend"));
        assert_eq!(spec.kind, JobKind::StillImage { frame: 5 });
        assert_eq!(spec.format, Format::PNG);
        assert_eq!(spec.output_base_name, "out");
        assert_eq!(spec.file_name, "out.png");
        assert!(spec.workspace.output_dir.is_dir());
        assert!(spec
            .workspace
            .output_dir
            .starts_with(fx.dir.path().join("renders")));
        assert_eq!(spec.output_stem(), spec.workspace.output_dir.join("out"));
    }

    #[tokio::test]
    async fn missing_scene_is_rejected_before_allocation() {
        let fx = fixture();
        let err = fx
            .validator
            .validate(RenderRequest::image(stored("missing.blend"), None, "out.png"))
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::SceneNotFound(ref name) if name == "missing.blend"));
        assert!(!fx.dir.path().join("renders").exists());
    }

    #[tokio::test]
    async fn scene_name_with_path_is_not_found() {
        let fx = fixture();
        let err = fx
            .validator
            .validate(RenderRequest::image(stored("../blends/cube.blend"), None, "out.png"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn format_is_checked_before_scene() {
        let fx = fixture();
        let err = fx
            .validator
            .validate(RenderRequest::image(stored("missing.blend"), None, "out.gif"))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn still_video_is_incompatible() {
        let fx = fixture();
        let err = fx
            .validator
            .validate(RenderRequest::image(stored("cube.blend"), None, "clip.mp4"))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "incompatible_format");
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn stages_inline_scene() {
        let fx = fixture();
        let scene = SceneSource::Inline {
            file_name: "upload.blend".to_owned(),
            data: b"BLENDER-v400".to_vec(),
        };
        let spec = fx
            .validator
            .validate(RenderRequest::animation(scene, None, None, "anim.mp4"))
            .await
            .unwrap();

        assert_eq!(spec.kind, JobKind::Animation { start: 1, end: None });
        assert!(spec.scene_path.ends_with(format!("{}/upload.blend", spec.id)));
        assert_eq!(std::fs::read(&spec.scene_path).unwrap(), b"BLENDER-v400");
    }

    #[tokio::test]
    async fn failed_allocation_discards_the_upload() {
        let fx = fixture();
        // a plain file where the render root should be makes allocation fail
        std::fs::write(fx.dir.path().join("renders"), b"").unwrap();
        let scene = SceneSource::Inline {
            file_name: "upload.blend".to_owned(),
            data: b"BLENDER".to_vec(),
        };

        let err = fx
            .validator
            .validate(RenderRequest::image(scene, None, "out.png"))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "storage_error");

        let leftovers = std::fs::read_dir(fx.dir.path().join("blends"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn release_removes_the_staged_scene() {
        let fx = fixture();
        let scene = SceneSource::Inline {
            file_name: "upload.blend".to_owned(),
            data: b"BLENDER".to_vec(),
        };
        let spec = fx
            .validator
            .validate(RenderRequest::image(scene, None, "out.png"))
            .await
            .unwrap();
        assert!(spec.scene_path.exists());

        fx.validator.release(&spec).await;
        assert!(!spec.scene_path.exists());
        assert!(fx.dir.path().join("blends").join("cube.blend").exists());
    }

    #[tokio::test]
    async fn identical_requests_get_distinct_workspaces() {
        let fx = fixture();
        let request = RenderRequest::image(stored("cube.blend"), None, "out.png");
        let a = fx.validator.validate(request.clone()).await.unwrap();
        let b = fx.validator.validate(request).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.workspace, b.workspace);
    }
}
