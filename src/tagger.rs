use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::error::{ConvertError, Result};
use crate::plan::Metadata;
use crate::process;

/// Embeds artist/album/title/track tags into an encoded file.
pub trait Tagger {
    fn tag(&self, path: &Path, metadata: &Metadata) -> Result<()>;
}

/// Writes ID3v2 tags by remuxing through ffmpeg into a sibling temporary
/// file, which then replaces the original.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTagger {
    timeout: Option<Duration>,
}

impl FfmpegTagger {
    /// `None` when ffmpeg is not installed.
    pub fn detect(timeout: Option<Duration>) -> Option<Self> {
        process::is_installed("ffmpeg").then_some(Self { timeout })
    }

    fn command(&self, input: &Path, output: &Path, metadata: &Metadata) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(input)
            .arg("-map")
            .arg("0")
            .arg("-c")
            .arg("copy")
            .arg("-id3v2_version")
            .arg("3");
        for (key, value) in tag_pairs(metadata) {
            cmd.arg("-metadata").arg(format!("{}={}", key, value));
        }
        cmd.arg("-y").arg(output);
        cmd
    }
}

fn tag_pairs(metadata: &Metadata) -> [(&'static str, String); 4] {
    [
        ("artist", metadata.artist.clone()),
        ("album", metadata.album.clone()),
        ("title", metadata.title.clone()),
        (
            "track",
            format!("{}/{}", metadata.track_number, metadata.track_total),
        ),
    ]
}

impl Tagger for FfmpegTagger {
    fn tag(&self, path: &Path, metadata: &Metadata) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let suffix = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        // Removed on drop unless persisted over the original.
        let tagged = tempfile::Builder::new()
            .prefix(".tagging-")
            .suffix(&suffix)
            .tempfile_in(dir)?;

        let status = process::run(self.command(path, tagged.path(), metadata), None, self.timeout)?;
        if !status.success() {
            return Err(ConvertError::Tag(format!("ffmpeg exited with {}", status)));
        }

        tagged
            .persist(path)
            .map_err(|e| ConvertError::Tag(format!("cannot replace {}: {}", path.display(), e.error)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_carries_every_tag() {
        let metadata = Metadata {
            artist: "Jane Doe".into(),
            album: "book".into(),
            title: "book_part_2".into(),
            track_number: 2,
            track_total: 3,
        };
        let cmd = FfmpegTagger::default().command(Path::new("a.mp3"), Path::new("b.mp3"), &metadata);
        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();

        for expected in ["artist=Jane Doe", "album=book", "title=book_part_2", "track=2/3"] {
            assert!(args.iter().any(|a| a == expected), "missing {}", expected);
        }
        assert_eq!(args.last().map(String::as_str), Some("b.mp3"));
    }
}
