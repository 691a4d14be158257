use super::{
    data_store::{fs_output_store::FsOutputStore, fs_scene_store::FsSceneStore},
    validator::Validator,
};
use crate::{
    domains::{output_store::OutputStore, scene_store::SceneStore},
    models::{
        error::RenderError,
        job::{JobSpec, RenderRequest, SceneSource},
        render_result::RenderResult,
        server_setting::ServerSetting,
    },
};
use blender::{
    artifact,
    blender::Blender,
    models::{args::Invocation, render_setting::RenderSetting},
};
use std::{io, sync::Arc, time::Duration};
use tracing::{error, info};

/// Runs a render request from start to finish: validate, build the invocation, run blender,
/// then locate what it wrote. Cheap to share between concurrent requests.
#[derive(Clone)]
pub struct Orchestrator {
    blender: Blender,
    validator: Validator,
    render: RenderSetting,
    timeout: Duration,
    autoexec: bool,
}

impl Orchestrator {
    pub fn new(
        blender: Blender,
        scenes: Arc<dyn SceneStore>,
        outputs: Arc<dyn OutputStore>,
        settings: &ServerSetting,
    ) -> Self {
        Self {
            blender,
            validator: Validator::new(scenes, outputs),
            render: settings.render.clone(),
            timeout: settings.timeout(),
            autoexec: settings.enable_autoexec,
        }
    }

    /// Filesystem stores rooted at the configured directories, made absolute first.
    pub fn from_settings(settings: &ServerSetting) -> io::Result<Self> {
        let settings = &settings.resolved()?;
        let scenes = Arc::new(FsSceneStore::new(&settings.blend_dir)?);
        let outputs = Arc::new(FsOutputStore::new(
            &settings.render_dir,
            &settings.script_dir,
        ));
        Ok(Self::new(
            Blender::new(&settings.blender),
            scenes,
            outputs,
            settings,
        ))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Command line and control script for `spec`. Does not touch the filesystem.
    pub fn invocation(&self, spec: &JobSpec) -> Invocation {
        spec.to_args(&self.render, self.autoexec)
            .invocation(self.blender.get_executable())
    }

    pub async fn render(&self, request: RenderRequest) -> Result<RenderResult, RenderError> {
        let spec = self.validator.validate(request).await?;
        let result = self.execute(&spec).await;
        self.validator.release(&spec).await;
        result
    }

    pub async fn render_image(
        &self,
        scene: SceneSource,
        frame: Option<i32>,
        output_name: &str,
    ) -> Result<RenderResult, RenderError> {
        self.render(RenderRequest::image(scene, frame, output_name))
            .await
    }

    pub async fn render_animation(
        &self,
        scene: SceneSource,
        start: Option<i32>,
        end: Option<i32>,
        output_name: &str,
    ) -> Result<RenderResult, RenderError> {
        self.render(RenderRequest::animation(scene, start, end, output_name))
            .await
    }

    /// Run blender for an already validated job and resolve its artifact.
    pub async fn execute(&self, spec: &JobSpec) -> Result<RenderResult, RenderError> {
        let args = spec.to_args(&self.render, self.autoexec);
        info!(job_id = %spec.id, timeout_secs = self.timeout.as_secs(), "Starting render");

        let report = self
            .blender
            .render(&args, self.timeout)
            .await
            .map_err(|e| {
                error!(job_id = %spec.id, error = %e, "Render failed");
                RenderError::from(e)
            })?;

        // a zero exit code is not proof of output, blender exits cleanly when it can't write
        let path = artifact::resolve(
            &spec.workspace.output_dir,
            &spec.output_base_name,
            spec.format,
        )
        .await
        .map_err(|e| {
            error!(job_id = %spec.id, error = %e, saved = ?report.saved, "Render produced no artifact");
            RenderError::from(e)
        })?;

        info!(
            job_id = %spec.id,
            artifact = %path.display(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Render complete"
        );
        Ok(RenderResult::new(spec, path))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::job::JobKind;
    use std::{
        ffi::OsString,
        os::unix::fs::PermissionsExt,
        path::{Path, PathBuf},
    };
    use tempfile::TempDir;

    // Mimics blender's output naming: `<stem><frame>.png` for stills,
    // `<stem><start>-<end>.mp4` for animations.
    const FAKE_BLENDER: &str = r#"#!/bin/sh
out=""; frame=""; anim=""
while [ $# -gt 0 ]; do
  case "$1" in
    --render-output) out="$2"; shift ;;
    --render-frame|--frame-start) frame="$2"; shift ;;
    --render-anim) anim=1 ;;
  esac
  shift
done
[ -n "$MARKER" ] && touch "$MARKER"
if [ -n "$anim" ]; then
  file="${out}$(printf %04d "$frame")-0250.mp4"
else
  file="${out}$(printf %04d "$frame").png"
fi
: > "$file"
echo "Saved: '$file'"
"#;

    struct Fixture {
        dir: TempDir,
        settings: ServerSetting,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().expect("temp dir");
            let settings = ServerSetting {
                render_dir: dir.path().join("renders"),
                blend_dir: dir.path().join("blends"),
                script_dir: dir.path().join("scripts"),
                blender: dir.path().join("fake-blender"),
                timeout_secs: 30,
                ..Default::default()
            };
            std::fs::create_dir_all(&settings.blend_dir).unwrap();
            std::fs::write(settings.blend_dir.join("cube.scene"), b"BLENDER").unwrap();
            Fixture { dir, settings }
        }

        fn engine(&self, body: &str) -> Orchestrator {
            let path = &self.settings.blender;
            std::fs::write(path, body).expect("write engine");
            let mut perms = std::fs::metadata(path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(path, perms).unwrap();
            Orchestrator::from_settings(&self.settings).unwrap()
        }

        fn marker(&self) -> PathBuf {
            self.dir.path().join("engine-ran")
        }

        fn engine_with_marker(&self) -> Orchestrator {
            let body = FAKE_BLENDER.replace(
                "[ -n \"$MARKER\" ]",
                &format!("MARKER=\"{}\"; [ -n \"$MARKER\" ]", self.marker().display()),
            );
            self.engine(&body)
        }
    }

    fn scene() -> SceneSource {
        SceneSource::Stored("cube.scene".to_owned())
    }

    fn arg_after<'a>(args: &'a [OsString], flag: &str) -> Option<&'a OsString> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
    }

    #[tokio::test]
    async fn renders_still_frame_end_to_end() {
        let fx = Fixture::new();
        let orchestrator = fx.engine(FAKE_BLENDER);

        let spec = orchestrator
            .validator()
            .validate(RenderRequest::image(scene(), Some(5), "out.png"))
            .await
            .unwrap();
        let invocation = orchestrator.invocation(&spec);
        assert_eq!(
            arg_after(&invocation.args, "--render-frame"),
            Some(&OsString::from("5"))
        );
        assert_eq!(
            arg_after(&invocation.args, "--render-output"),
            Some(&spec.workspace.output_dir.join("out").into_os_string())
        );
        assert!(invocation.script_body.contains("'PNG'"));

        let result = orchestrator.execute(&spec).await.unwrap();
        assert_eq!(result.artifact_path, spec.workspace.output_dir.join("out0005.png"));
        assert_eq!(result.media_type, "image/png");
        assert_eq!(result.file_name, "out.png");
        assert_eq!(result.job_id, spec.id);
        assert!(result.artifact_path.is_file());
        assert!(!spec.workspace.script_path.exists());
    }

    #[tokio::test]
    async fn engine_runs_inside_the_job_directory() {
        let fx = Fixture::new();
        let body = FAKE_BLENDER.replace(": > \"$file\"", "pwd -P > cwd.txt\n: > \"$file\"");
        let orchestrator = fx.engine(&body);

        let result = orchestrator
            .render_image(scene(), None, "out.png")
            .await
            .unwrap();
        let job_dir = result.artifact_path.parent().unwrap();
        let cwd = std::fs::read_to_string(job_dir.join("cwd.txt")).expect("cwd written");
        assert_eq!(PathBuf::from(cwd.trim()), std::fs::canonicalize(job_dir).unwrap());
    }

    #[tokio::test]
    async fn uploaded_scene_is_removed_after_render() {
        let fx = Fixture::new();
        let orchestrator = fx.engine(FAKE_BLENDER);
        let upload = SceneSource::Inline {
            file_name: "upload.blend".to_owned(),
            data: b"BLENDER".to_vec(),
        };

        let result = orchestrator
            .render_image(upload, None, "out.png")
            .await
            .unwrap();
        assert!(result.artifact_path.is_file());
        assert!(!fx.settings.blend_dir.join(result.job_id.to_string()).exists());
        assert!(fx.settings.blend_dir.join("cube.scene").exists());
    }

    #[tokio::test]
    async fn cancelled_render_leaves_no_script() {
        let fx = Fixture::new();
        let orchestrator = fx.engine("#!/bin/sh\nexec sleep 30\n");

        let cancelled = tokio::time::timeout(
            Duration::from_millis(500),
            orchestrator.render_image(scene(), None, "out.png"),
        )
        .await;
        assert!(cancelled.is_err());

        let scripts = std::fs::read_dir(&fx.settings.script_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(scripts, 0);
    }

    #[tokio::test]
    async fn renders_animation_to_video() {
        let fx = Fixture::new();
        let orchestrator = fx.engine(FAKE_BLENDER);

        let result = orchestrator
            .render_animation(scene(), None, None, "shot.mp4")
            .await
            .unwrap();
        let name = result.artifact_path.file_name().unwrap();
        assert_eq!(name, "shot0001-0250.mp4");
        assert_eq!(result.media_type, "video/mp4");
    }

    #[tokio::test]
    async fn open_animation_has_no_end_frame() {
        let fx = Fixture::new();
        let orchestrator = fx.engine(FAKE_BLENDER);
        let spec = orchestrator
            .validator()
            .validate(RenderRequest::animation(scene(), Some(3), None, "shot.avi"))
            .await
            .unwrap();
        assert_eq!(spec.kind, JobKind::Animation { start: 3, end: None });

        let invocation = orchestrator.invocation(&spec);
        assert!(!invocation.args.iter().any(|a| a == "--frame-end"));
        assert!(!invocation.script_body.contains("frame_end"));
        assert_eq!(invocation, orchestrator.invocation(&spec));
    }

    #[tokio::test]
    async fn concurrent_jobs_with_same_name_do_not_collide() {
        let fx = Fixture::new();
        let orchestrator = fx.engine(FAKE_BLENDER);

        let (a, b) = tokio::join!(
            orchestrator.render_image(scene(), Some(1), "out.png"),
            orchestrator.render_image(scene(), Some(1), "out.png"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.job_id, b.job_id);
        assert_ne!(a.artifact_path, b.artifact_path);
        assert!(a.artifact_path.is_file());
        assert!(b.artifact_path.is_file());
    }

    #[tokio::test]
    async fn clean_exit_without_output_is_artifact_not_found() {
        let fx = Fixture::new();
        let orchestrator = fx.engine("#!/bin/sh\nexit 0\n");

        let err = orchestrator
            .render_image(scene(), None, "out.png")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::ArtifactNotFound(_)), "{err:?}");
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn engine_failure_keeps_exit_code() {
        let fx = Fixture::new();
        let orchestrator = fx.engine("#!/bin/sh\necho 'Error: Cannot read file' >&2\nexit 1\n");

        let err = orchestrator
            .render_image(scene(), None, "out.png")
            .await
            .unwrap_err();
        match err {
            RenderError::EngineFailure { exit_code, stderr } => {
                assert_eq!(exit_code, Some(1));
                assert!(stderr.contains("Cannot read file"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_scene_never_starts_the_engine() {
        let fx = Fixture::new();
        let orchestrator = fx.engine_with_marker();

        let err = orchestrator
            .render_image(SceneSource::Stored("nope.scene".to_owned()), None, "out.png")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::SceneNotFound(_)));
        assert!(!fx.marker().exists());

        orchestrator
            .render_image(scene(), None, "out.png")
            .await
            .unwrap();
        assert!(fx.marker().exists());
    }

    #[tokio::test]
    async fn slow_engine_times_out() {
        let fx = Fixture::new();
        let orchestrator = fx
            .engine("#!/bin/sh\nexec sleep 30\n")
            .with_timeout(Duration::from_millis(300));

        let err = orchestrator
            .render_image(scene(), None, "out.png")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::EngineTimeout(_)), "{err:?}");
    }

    #[tokio::test]
    async fn missing_engine_is_spawn_error() {
        let fx = Fixture::new();
        let mut settings = fx.settings.clone();
        settings.blender = Path::new("/nonexistent/blender").to_path_buf();
        let orchestrator = Orchestrator::from_settings(&settings).unwrap();

        let err = orchestrator
            .render_image(scene(), None, "out.png")
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "spawn_error");
    }
}
