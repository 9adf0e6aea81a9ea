//! Segmentation of a word selection into parts, and how each part is named.

use std::ffi::OsString;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};

/// Splits `word_count` words into contiguous part boundaries.
///
/// `None` means one part covering everything. The number of parts is
/// `word_count / words_per_part` (at least one), and the last part absorbs the
/// remainder so no trailing words are dropped. Zero words yield zero parts.
pub fn plan_boundaries(word_count: usize, words_per_part: Option<usize>) -> Result<Vec<Range<usize>>> {
    let chunk = match words_per_part {
        Some(0) => {
            return Err(ConvertError::Config(
                "words per part must be a positive integer".into(),
            ))
        }
        Some(n) => n,
        None => word_count,
    };

    if word_count == 0 {
        return Ok(Vec::new());
    }

    let parts = (word_count / chunk).max(1);
    Ok((0..parts)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 == parts { word_count } else { start + chunk };
            start..end
        })
        .collect())
}

/// Output base path and extension, split once so every part derives from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputName {
    base: PathBuf,
    /// Includes the leading dot.
    extension: String,
}

impl OutputName {
    /// `book.mp3` keeps its extension; `book` gets `default_extension`.
    pub fn new(output: &Path, default_extension: &str) -> Self {
        match output.extension() {
            Some(ext) => Self {
                base: output.with_extension(""),
                extension: format!(".{}", ext.to_string_lossy()),
            },
            None => Self {
                base: output.to_path_buf(),
                extension: format!(".{}", default_extension.trim_start_matches('.')),
            },
        }
    }

    /// Output path and title for part `index` (1-based) of `total`.
    pub fn part(&self, index: usize, total: usize) -> (PathBuf, String) {
        let mut name: OsString = self.base.clone().into_os_string();
        if total != 1 {
            name.push(format!("_part_{}", index));
        }
        name.push(&self.extension);

        let path = PathBuf::from(name);
        let title = file_stem(&path);
        (path, title)
    }

    /// Album fallback: the base filename without directories.
    pub fn album(&self) -> String {
        file_stem(&self.base)
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Caller-supplied tags. Unset fields are derived per part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagOverrides {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub track_number: usize,
    pub track_total: usize,
}

/// One output unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartPlan {
    /// 1-based.
    pub index: usize,
    pub total: usize,
    /// Word range relative to the selection.
    pub words: Range<usize>,
    pub output_path: PathBuf,
    pub metadata: Metadata,
}

impl PartPlan {
    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

/// Plans every part of a selection of `word_count` words.
pub fn plan_parts(
    word_count: usize,
    words_per_part: Option<usize>,
    name: &OutputName,
    tags: &TagOverrides,
    default_artist: &str,
) -> Result<Vec<PartPlan>> {
    let boundaries = plan_boundaries(word_count, words_per_part)?;
    let total = boundaries.len();
    let artist = tags.artist.clone().unwrap_or_else(|| default_artist.to_string());
    let album = tags.album.clone().unwrap_or_else(|| name.album());

    Ok(boundaries
        .into_iter()
        .enumerate()
        .map(|(i, words)| {
            let index = i + 1;
            let (output_path, derived_title) = name.part(index, total);
            let title = match &tags.track {
                Some(track) if total > 1 => format!("{} (Part {})", track, index),
                Some(track) => track.clone(),
                None => derived_title,
            };
            PartPlan {
                index,
                total,
                words,
                output_path,
                metadata: Metadata {
                    artist: artist.clone(),
                    album: album.clone(),
                    title,
                    track_number: index,
                    track_total: total,
                },
            }
        })
        .collect())
}
