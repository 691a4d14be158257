use crate::models::{job::SceneSource, server_setting::ServerSetting};
use clap::{Args, Parser, Subcommand};
use std::{io, path::PathBuf};

#[derive(Parser)]
#[command(name = "render-dispatch")]
#[command(version)]
#[command(about = "Render blend files with a local blender installation and report the produced file.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, env = "RENDER_DISPATCH_CONFIG")]
    #[arg(help = "Settings file to use instead of the one in the user's config directory")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "BLENDER_PATH")]
    #[arg(help = "Blender executable")]
    pub blender: Option<PathBuf>,

    #[arg(long, env = "RENDER_TIMEOUT")]
    #[arg(help = "Seconds a render may run before it is terminated")]
    pub timeout: Option<u64>,

    #[arg(long, env = "RENDER_DIR")]
    pub render_dir: Option<PathBuf>,

    #[arg(long, env = "BLEND_DIR")]
    pub blend_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SceneArgs {
    #[arg(long)]
    #[arg(help = "Name of a blend file inside the blend directory")]
    pub scene: Option<String>,

    #[arg(long)]
    #[arg(help = "Local blend file to upload for this render")]
    pub upload: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a single frame.
    Image {
        #[command(flatten)]
        scene: SceneArgs,
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        frame: i32,
        #[arg(long, default_value = "rendered_image.png")]
        output: String,
    },
    /// Render a frame range, either as a video or as an image sequence.
    Animation {
        #[command(flatten)]
        scene: SceneArgs,
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        start: i32,
        /// Defaults to the end frame stored in the blend file.
        #[arg(long, allow_negative_numbers = true)]
        end: Option<i32>,
        #[arg(long, default_value = "animation.mp4")]
        output: String,
    },
    /// Print the version of the configured blender executable.
    Probe,
    /// Print the effective settings.
    Config {
        #[arg(long)]
        #[arg(help = "Persist the effective settings")]
        save: bool,
    },
}

impl Cli {
    /// Command line values win over the loaded settings.
    pub fn apply(&self, settings: &mut ServerSetting) {
        if let Some(blender) = &self.blender {
            settings.blender = blender.clone();
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_secs = timeout;
        }
        if let Some(dir) = &self.render_dir {
            settings.render_dir = dir.clone();
        }
        if let Some(dir) = &self.blend_dir {
            settings.blend_dir = dir.clone();
        }
    }
}

impl SceneArgs {
    /// Uploaded files are read into memory here and staged by the scene store later.
    pub async fn into_source(self) -> io::Result<SceneSource> {
        match (self.scene, self.upload) {
            (Some(name), _) => Ok(SceneSource::Stored(name)),
            (None, Some(path)) => {
                let file_name = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::InvalidInput,
                            format!("Upload path {path:?} has no usable file name"),
                        )
                    })?
                    .to_owned();
                let data = tokio::fs::read(&path).await?;
                Ok(SceneSource::Inline { file_name, data })
            }
            (None, None) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Either --scene or --upload is required",
            )),
        }
    }
}
