use crate::models::{format::Format, naming::NamingPattern};
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("No {format} output matching \"{stem}\" found in {dir:?}")]
    NotFound {
        dir: PathBuf,
        stem: String,
        format: Format,
    },
    #[error("Invalid naming pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Unable to scan output directory: {0}")]
    Io(#[from] io::Error),
}

/// Find the file blender produced for `stem` inside `dir`.
///
/// Blender may or may not append frame numbers, so the directory is scanned with the naming
/// pattern of `format`. When several files match, the lexicographically first one wins.
pub async fn resolve(dir: &Path, stem: &str, format: Format) -> Result<PathBuf, ArtifactError> {
    let pattern = NamingPattern::for_format(format);
    let regex = pattern.regex(stem, format)?;

    let mut matches = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if regex.is_match(name) {
            matches.push(name.to_owned());
        }
    }

    matches.sort();
    debug!(dir = %dir.display(), stem, ?pattern, candidates = ?matches, "Scanned output directory");

    match matches.into_iter().next() {
        Some(name) => Ok(dir.join(name)),
        None => Err(ArtifactError::NotFound {
            dir: dir.to_path_buf(),
            stem: stem.to_owned(),
            format,
        }),
    }
}
