use std::path::Path;
use std::process::Command;
use std::time::Duration;

use log::debug;

use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::process;

/// Transcodes a waveform into the compressed output format.
pub trait Encoder {
    fn encode(&self, wav_path: &Path, output_path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mp3Tool {
    Lame,
    Ffmpeg,
}

/// Constant-bitrate MP3 encoding with lame, or ffmpeg as fallback.
#[derive(Debug, Clone)]
pub struct Mp3Encoder {
    tool: Mp3Tool,
    bitrate_kbps: u32,
    timeout: Option<Duration>,
}

impl Mp3Encoder {
    pub fn detect(config: &Config) -> Result<Self> {
        let tool = match process::detect(&["lame", "ffmpeg"]) {
            Some("lame") => Mp3Tool::Lame,
            Some(_) => Mp3Tool::Ffmpeg,
            None => {
                return Err(ConvertError::ToolNotFound {
                    kind: "MP3 encoder",
                    hint: "lame or ffmpeg",
                })
            }
        };
        debug!("using MP3 encoder {:?}", tool);
        Ok(Self::with_tool(tool, config))
    }

    pub fn with_tool(tool: Mp3Tool, config: &Config) -> Self {
        Self {
            tool,
            bitrate_kbps: config.bitrate_kbps,
            timeout: config.part_timeout(),
        }
    }

    fn command(&self, wav_path: &Path, output_path: &Path) -> Command {
        match self.tool {
            Mp3Tool::Lame => {
                let mut cmd = Command::new("lame");
                cmd.arg("--quiet")
                    .arg("-b")
                    .arg(self.bitrate_kbps.to_string())
                    .arg(wav_path)
                    .arg(output_path);
                cmd
            }
            Mp3Tool::Ffmpeg => {
                let mut cmd = Command::new("ffmpeg");
                cmd.arg("-hide_banner")
                    .arg("-loglevel")
                    .arg("error")
                    .arg("-i")
                    .arg(wav_path)
                    .arg("-c:a")
                    .arg("libmp3lame")
                    .arg("-b:a")
                    .arg(format!("{}k", self.bitrate_kbps))
                    .arg("-y")
                    .arg(output_path);
                cmd
            }
        }
    }
}

impl Encoder for Mp3Encoder {
    fn encode(&self, wav_path: &Path, output_path: &Path) -> Result<()> {
        let status = process::run(self.command(wav_path, output_path), None, self.timeout)?;
        if !status.success() {
            return Err(ConvertError::Encode(format!("{:?} exited with {}", self.tool, status)));
        }
        Ok(())
    }
}
