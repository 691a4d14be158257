use blender::models::render_setting::RenderSetting;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/*
    Developer blog
    - The render dispatcher shares the config folder with the rest of BlendFarm, but keeps its own file.
    Every field has a default so an older config file keeps loading after new fields are added.
*/

const SETTINGS_PATH: &str = "BlendFarm/";
const SETTINGS_FILE_NAME: &str = "RenderDispatch.json";
const RENDER_DIR: &str = "RenderData/";
const BLEND_DIR: &str = "BlendFiles/";
const SCRIPT_DIR: &str = "RenderScripts/";
const DEFAULT_TIMEOUT_SECS: u64 = 60 * 60;

#[derive(Debug, Error)]
pub enum SettingError {
    #[error("No config directory available on this platform")]
    NoConfigDir,
    #[error("Unable to access settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unable to parse settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings the dispatcher runs with. Command line flags override them per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSetting {
    /// Root of the per job output directories.
    pub render_dir: PathBuf,
    /// Blend files known by name, and staged uploads.
    pub blend_dir: PathBuf,
    /// Generated control scripts.
    pub script_dir: PathBuf,
    /// Blender executable, either a path or a name looked up in PATH.
    pub blender: PathBuf,
    pub timeout_secs: u64,
    /// Allow python scripts embedded in blend files to run.
    pub enable_autoexec: bool,
    pub render: RenderSetting,
}

impl Default for ServerSetting {
    fn default() -> Self {
        let temp = std::env::temp_dir();
        Self {
            render_dir: temp.join(RENDER_DIR),
            blend_dir: temp.join(BLEND_DIR),
            script_dir: temp.join(SCRIPT_DIR),
            blender: PathBuf::from("blender"),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            enable_autoexec: false,
            render: RenderSetting::default(),
        }
    }
}

impl ServerSetting {
    pub fn get_config_path() -> Result<PathBuf, SettingError> {
        let dir = dirs::config_dir().ok_or(SettingError::NoConfigDir)?;
        Ok(dir.join(SETTINGS_PATH).join(SETTINGS_FILE_NAME))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Same settings with every directory made absolute against the current directory.
    /// Blender runs inside the job directory, so relative paths would point somewhere else.
    /// A bare executable name is kept as is and looked up in PATH.
    pub fn resolved(&self) -> io::Result<ServerSetting> {
        let cwd = std::env::current_dir()?;
        let absolute = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                cwd.join(path)
            }
        };
        let blender = if self.blender.components().count() > 1 {
            absolute(&self.blender)
        } else {
            self.blender.clone()
        };
        Ok(ServerSetting {
            render_dir: absolute(&self.render_dir),
            blend_dir: absolute(&self.blend_dir),
            script_dir: absolute(&self.script_dir),
            blender,
            ..self.clone()
        })
    }

    /// Load user configurations from the user's config directory.
    pub fn load() -> Result<ServerSetting, SettingError> {
        Self::load_from(Self::get_config_path()?)
    }

    /// A missing file yields the defaults. A malformed one is an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<ServerSetting, SettingError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ServerSetting::default()),
            Err(source) => Err(SettingError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Save the configurations to the user's config directory.
    pub fn save(&self) -> Result<PathBuf, SettingError> {
        let path = Self::get_config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), SettingError> {
        let path = path.as_ref();
        let to_error = |source| SettingError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(to_error)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data).map_err(to_error)
    }
}
