use serde::{Deserialize, Serialize};

// context for serde: https://serde.rs/enum-representations.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    // JSON: "Frame": "i32",
    Frame(i32),

    // JSON: "Animation": {"start":"i32", "end":"i32" | null}
    // `end: None` leaves the frame end stored in the blend file untouched.
    Animation { start: i32, end: Option<i32> },
}

impl Mode {
    pub fn is_animation(&self) -> bool {
        matches!(self, Mode::Animation { .. })
    }
}
