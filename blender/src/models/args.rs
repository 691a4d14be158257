use crate::models::{
    format::Format, mode::Mode, render_setting::RenderSetting, script::Script,
};
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Fully specified blender command for one job: executable, ordered arguments and the body of
/// the control script that has to exist at `script_path` before the process starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Directory blender runs in. Relative paths written by the scene land here.
    pub working_dir: PathBuf,
    pub script_path: PathBuf,
    pub script_body: String,
}

// ref: https://docs.blender.org/manual/en/latest/advanced/command_line/render.html
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Args {
    file: PathBuf,   // required
    output: PathBuf, // required - path stem, blender appends frame numbers and extension
    mode: Mode,      // required
    format: Format,  // required
    script: PathBuf, // required - must not live inside the output directory
    pub settings: RenderSetting,
    pub autoexec: bool,
}

impl Args {
    pub fn new(
        file: impl AsRef<Path>,
        output: impl AsRef<Path>,
        mode: Mode,
        format: Format,
        script: impl AsRef<Path>,
    ) -> Self {
        Args {
            file: file.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            mode,
            format,
            script: script.as_ref().to_path_buf(),
            settings: RenderSetting::default(),
            autoexec: false,
        }
    }

    pub fn with_settings(mut self, settings: RenderSetting) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_autoexec(mut self, autoexec: bool) -> Self {
        self.autoexec = autoexec;
        self
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn create_arg_list(&self) -> Vec<OsString> {
        // More context: https://docs.blender.org/manual/en/latest/advanced/command_line/arguments.html#argument-order
        // Arguments are executed in order, so the script and output path must come before the render flag.
        let mut col: Vec<OsString> = vec![
            "--background".into(),
            self.file.clone().into(),
            if self.autoexec {
                "--enable-autoexec".into()
            } else {
                "--disable-autoexec".into()
            },
        ];

        if let Some(engine) = &self.settings.engine {
            col.push("--engine".into());
            col.push(engine.to_string().into());
        }

        // a python exception in the control script should fail the job instead of rendering with defaults
        col.push("--python-exit-code".into());
        col.push("1".into());
        col.push("--python".into());
        col.push(self.script.clone().into());

        // no "#" in the path: blender appends the zero padded frame number itself
        col.push("--render-output".into());
        col.push(self.output.clone().into());

        // this argument must be set at the very end
        match self.mode {
            Mode::Frame(frame) => {
                col.push("--render-frame".into());
                col.push(frame.to_string().into());
            }
            Mode::Animation { start, end } => {
                col.push("--frame-start".into());
                col.push(start.to_string().into());
                // without an explicit end blender keeps the end frame saved in the blend file
                if let Some(end) = end {
                    col.push("--frame-end".into());
                    col.push(end.to_string().into());
                }
                col.push("--render-anim".into());
            }
        }

        col
    }

    /// Control script for the settings the command line cannot express.
    pub fn create_script(&self) -> Script {
        let mut script = Script::new();
        let gpu = self.settings.device.is_gpu();

        script.import("bpy");
        if gpu {
            script.import("re");
        }
        script.blank().raw("scene = bpy.context.scene");

        script
            .comment("output encoding")
            .assign(
                "scene.render.image_settings.file_format",
                self.format.file_format(),
            );
        if let Some((container, codec)) = self.format.ffmpeg() {
            script
                .assign("scene.render.ffmpeg.format", container)
                .assign("scene.render.ffmpeg.codec", codec);
        }
        script.assign("scene.render.use_file_extension", true);

        if let Some(resolution) = &self.settings.resolution {
            script
                .comment("resolution")
                .assign("scene.render.resolution_x", resolution.width)
                .assign("scene.render.resolution_y", resolution.height)
                .assign("scene.render.resolution_percentage", 100_u32);
        }

        if let Some(samples) = self.settings.samples {
            script.assign("scene.cycles.samples", samples);
        }
        if let Some(threshold) = self.settings.adaptive_threshold {
            script.assign("scene.cycles.adaptive_threshold", threshold);
        }

        if gpu {
            script
                .comment("compute device")
                .raw("cprefs = bpy.context.preferences.addons['cycles'].preferences")
                .begin("try")
                .assign("cprefs.compute_device_type", self.settings.device.to_string())
                .end()
                .begin("except TypeError")
                .call("print", "Compute device type unavailable, keeping CPU")
                .end()
                .begin("else")
                .raw("cprefs.get_devices()")
                .begin("for device in cprefs.devices")
                .begin("if not re.match('intel', device.name, re.I)")
                .raw("device.use = True")
                .end()
                .end()
                .assign("scene.cycles.device", "GPU")
                .end();
        }

        script
    }

    /// Directory holding the output stem, or "." for a bare stem.
    pub fn working_dir(&self) -> PathBuf {
        match self.output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Build the full command for `program`. Pure: nothing is written or spawned here.
    pub fn invocation(&self, program: impl AsRef<Path>) -> Invocation {
        Invocation {
            program: program.as_ref().to_path_buf(),
            args: self.create_arg_list(),
            working_dir: self.working_dir(),
            script_path: self.script.clone(),
            script_body: self.create_script().render(),
        }
    }
}
