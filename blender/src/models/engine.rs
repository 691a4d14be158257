use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Engine {
    Cycles,
    Eevee,
    Workbench,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Engine::Cycles => "CYCLES",
            Engine::Eevee => "BLENDER_EEVEE",
            Engine::Workbench => "BLENDER_WORKBENCH",
        };
        f.write_str(name)
    }
}
