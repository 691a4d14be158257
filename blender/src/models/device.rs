use serde::{Deserialize, Serialize};
use std::fmt;

/// Cycles compute backend. Anything other than `CPU` switches the scene to GPU rendering.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Device {
    #[default]
    CPU,
    CUDA,
    OPTIX,
    HIP,
    ONEAPI,
    METAL,
}

impl Device {
    pub fn is_gpu(&self) -> bool {
        !matches!(self, Device::CPU)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Device::CPU => "CPU",
            Device::CUDA => "CUDA",
            Device::OPTIX => "OPTIX",
            Device::HIP => "HIP",
            Device::ONEAPI => "ONEAPI",
            Device::METAL => "METAL",
        };
        f.write_str(name)
    }
}
