use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unsupported output format: \"{0}\"")]
    InvalidInput(String),
}

/// Whether a format holds a single picture or a whole clip.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Image,
    Video,
}

/// Result of looking up an output token in the registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Classification {
    Valid(Kind),
    Invalid,
}

// More context: https://docs.blender.org/api/current/bpy_types_enum_items/image_type_items.html
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum Format {
    #[default]
    PNG,
    JPEG,
    TIFF,
    BMP,
    OPEN_EXR,
    HDR,
    MP4,
    AVI,
}

impl Format {
    pub const ALL: [Format; 8] = [
        Format::PNG,
        Format::JPEG,
        Format::TIFF,
        Format::BMP,
        Format::OPEN_EXR,
        Format::HDR,
        Format::MP4,
        Format::AVI,
    ];

    /// Parse a token taken from a file extension. Leading dot and letter case are ignored.
    pub fn from_token(token: &str) -> Result<Self, FormatError> {
        token.parse()
    }

    pub fn kind(&self) -> Kind {
        match self {
            Format::MP4 | Format::AVI => Kind::Video,
            _ => Kind::Image,
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind() == Kind::Video
    }

    /// Value assigned to `scene.render.image_settings.file_format`.
    pub fn file_format(&self) -> &'static str {
        match self {
            Format::PNG => "PNG",
            Format::JPEG => "JPEG",
            Format::TIFF => "TIFF",
            Format::BMP => "BMP",
            Format::OPEN_EXR => "OPEN_EXR",
            Format::HDR => "HDR",
            Format::MP4 | Format::AVI => "FFMPEG",
        }
    }

    /// Container and codec pair handed to blender's ffmpeg output. Still formats have none.
    pub fn ffmpeg(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Format::MP4 => Some(("MPEG4", "H264")),
            Format::AVI => Some(("AVI", "MPEG4")),
            _ => None,
        }
    }

    /// File extensions blender may write for this format, canonical one first.
    /// Blender picks its own extension, so a requested `.jpeg` comes back as `.jpg`.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Format::PNG => &["png"],
            Format::JPEG => &["jpg", "jpeg"],
            Format::TIFF => &["tif", "tiff"],
            Format::BMP => &["bmp"],
            Format::OPEN_EXR => &["exr"],
            Format::HDR => &["hdr"],
            Format::MP4 => &["mp4"],
            Format::AVI => &["avi"],
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            Format::PNG => "image/png",
            Format::JPEG => "image/jpeg",
            Format::TIFF => "image/tiff",
            Format::BMP => "image/bmp",
            Format::OPEN_EXR => "image/x-exr",
            Format::HDR => "image/vnd.radiance",
            Format::MP4 => "video/mp4",
            Format::AVI => "video/x-msvideo",
        }
    }
}

/// Registry lookup for a raw token such as `"png"` or `".MP4"`.
pub fn classify(token: &str) -> Classification {
    match Format::from_token(token) {
        Ok(format) => Classification::Valid(format.kind()),
        Err(_) => Classification::Invalid,
    }
}

impl Serialize for Format {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.strip_prefix('.').unwrap_or(s);
        match token.to_uppercase().as_str() {
            "PNG" => Ok(Format::PNG),
            "JPEG" => Ok(Format::JPEG),
            "TIFF" => Ok(Format::TIFF),
            "BMP" => Ok(Format::BMP),
            "OPEN_EXR" => Ok(Format::OPEN_EXR),
            "HDR" => Ok(Format::HDR),
            "MP4" => Ok(Format::MP4),
            "AVI" => Ok(Format::AVI),
            _ => Err(FormatError::InvalidInput(s.to_owned())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::PNG => "PNG",
            Format::JPEG => "JPEG",
            Format::TIFF => "TIFF",
            Format::BMP => "BMP",
            Format::OPEN_EXR => "OPEN_EXR",
            Format::HDR => "HDR",
            Format::MP4 => "MP4",
            Format::AVI => "AVI",
        };
        f.write_str(name)
    }
}
