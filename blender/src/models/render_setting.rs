use super::{device::Device, engine::Engine};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Overrides applied on top of the settings stored in the blend file.
/// `None` keeps whatever the scene already has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSetting {
    pub resolution: Option<Resolution>,
    /// Cycles sample count
    pub samples: Option<u32>,
    /// Cycles adaptive sampling noise threshold
    pub adaptive_threshold: Option<f64>,
    pub device: Device,
    pub engine: Option<Engine>,
}

impl Default for RenderSetting {
    fn default() -> Self {
        Self {
            resolution: Some(Resolution {
                width: 1920,
                height: 1080,
            }),
            samples: Some(200),
            adaptive_threshold: Some(0.01),
            device: Device::CPU,
            engine: None,
        }
    }
}

impl RenderSetting {
    /// Leave every setting of the blend file as is.
    pub fn scene_defaults() -> Self {
        Self {
            resolution: None,
            samples: None,
            adaptive_threshold: None,
            device: Device::CPU,
            engine: None,
        }
    }
}
