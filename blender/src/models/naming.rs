use super::format::{Format, Kind};
use regex::Regex;

/// How blender names the files it writes for a given output stem.
///
/// | pattern | template | examples for stem `shot` |
/// |---|---|---|
/// | `Frame` | `<stem>[digits].<ext>` | `shot.png`, `shot0005.png` |
/// | `Range` | `<stem>[digits]-<digits>.<ext>` | `shot-0001.mp4`, `shot0001-0250.mp4` |
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NamingPattern {
    Frame,
    Range,
}

impl NamingPattern {
    pub fn for_format(format: Format) -> Self {
        match format.kind() {
            Kind::Image => NamingPattern::Frame,
            Kind::Video => NamingPattern::Range,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            NamingPattern::Frame => r"\d*",
            NamingPattern::Range => r"\d*-\d+",
        }
    }

    /// Anchored regex for `stem` and the extensions of `format`. The stem is matched literally.
    pub fn regex(&self, stem: &str, format: Format) -> Result<Regex, regex::Error> {
        let extensions = format
            .extensions()
            .iter()
            .map(|ext| regex::escape(ext))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(
            r"^{}{}\.(?i:{})$",
            regex::escape(stem),
            self.suffix(),
            extensions
        );
        Regex::new(&pattern)
    }
}
