use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// Default words per part when `--parts` is given without a value
/// (about 30 minutes at 150 words per minute).
pub const DEFAULT_WORDS_PER_PART: usize = 4500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub words_per_part: usize,
    pub bitrate_kbps: u32,
    pub voice: String,
    pub voice_speed: f32,
    pub voice_pitch: f32,
    pub default_artist: String,
    /// Audio extension used when the output path carries none, without the dot.
    pub extension: String,
    pub part_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            words_per_part: DEFAULT_WORDS_PER_PART,
            bitrate_kbps: 64,
            voice: "en".to_string(),
            voice_speed: 1.0,
            voice_pitch: 1.0,
            default_artist: "epub2mp3".to_string(),
            extension: "mp3".to_string(),
            part_timeout_secs: None,
        }
    }
}

impl Config {
    /// Reads a JSON config file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConvertError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| {
            ConvertError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.words_per_part == 0 {
            return Err(ConvertError::Config("words_per_part must be positive".into()));
        }
        if self.bitrate_kbps == 0 {
            return Err(ConvertError::Config("bitrate_kbps must be positive".into()));
        }
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(ConvertError::Config("extension must not be empty".into()));
        }
        if self.part_timeout_secs == Some(0) {
            return Err(ConvertError::Config("part_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn part_timeout(&self) -> Option<Duration> {
        self.part_timeout_secs.map(Duration::from_secs)
    }
}
