//! Speech synthesis through locally installed TTS engines.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use log::debug;

use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::process;

/// Produces a waveform file from text. Blocks until the file is complete.
pub trait Synthesizer {
    fn synthesize(&self, text: &str, wav_path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    EspeakNg,
    Espeak,
    Festival,
}

impl Engine {
    /// Executable the engine runs as.
    pub fn program(self) -> &'static str {
        match self {
            Engine::EspeakNg => "espeak-ng",
            Engine::Espeak => "espeak",
            Engine::Festival => "text2wave",
        }
    }
}

/// Command-line TTS engine. Every call starts a fresh engine process, so no
/// engine state outlives the part it was started for.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    engine: Engine,
    voice: String,
    voice_speed: f32,
    voice_pitch: f32,
    timeout: Option<Duration>,
}

impl CommandSynthesizer {
    /// Picks the first installed engine, preferring espeak-ng.
    pub fn detect(config: &Config) -> Result<Self> {
        let engine = [Engine::EspeakNg, Engine::Espeak, Engine::Festival]
            .into_iter()
            .find(|engine| process::is_installed(engine.program()))
            .ok_or(ConvertError::ToolNotFound {
                kind: "TTS engine",
                hint: "espeak-ng, espeak, or festival",
            })?;
        debug!("using TTS engine {}", engine.program());
        Ok(Self::with_engine(engine, config))
    }

    pub fn with_engine(engine: Engine, config: &Config) -> Self {
        Self {
            engine,
            voice: config.voice.clone(),
            voice_speed: config.voice_speed,
            voice_pitch: config.voice_pitch,
            timeout: config.part_timeout(),
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    fn command(&self, wav_path: &Path) -> Command {
        let mut cmd = Command::new(self.engine.program());
        match self.engine {
            Engine::EspeakNg | Engine::Espeak => {
                cmd.arg("-v")
                    .arg(&self.voice)
                    .arg("-s")
                    .arg(format!("{}", (self.voice_speed * 175.0) as u32))
                    .arg("-p")
                    .arg(format!("{}", (self.voice_pitch * 50.0) as u32))
                    .arg("-a")
                    .arg("100")
                    .arg("--stdin")
                    .arg("-w")
                    .arg(wav_path);
            }
            Engine::Festival => {
                cmd.arg("-o").arg(wav_path);
            }
        }
        cmd
    }
}

impl Synthesizer for CommandSynthesizer {
    fn synthesize(&self, text: &str, wav_path: &Path) -> Result<()> {
        let status = process::run(self.command(wav_path), Some(text), self.timeout)?;
        if !status.success() {
            return Err(ConvertError::Synthesis(format!(
                "{} exited with {}",
                self.engine.program(),
                status
            )));
        }
        Ok(())
    }
}

/// Opens a synthesized waveform and returns its playing time.
/// A missing, malformed, or silent-length file is a synthesis failure.
pub fn probe_waveform(path: &Path) -> Result<Duration> {
    let reader = hound::WavReader::open(path).map_err(|e| {
        ConvertError::Synthesis(format!("unreadable waveform {}: {}", path.display(), e))
    })?;
    let spec = reader.spec();
    let frames = reader.duration();
    if frames == 0 || spec.sample_rate == 0 {
        return Err(ConvertError::Synthesis(format!(
            "{} contains no audio",
            path.display()
        )));
    }
    Ok(Duration::from_nanos(
        u64::from(frames) * 1_000_000_000 / u64::from(spec.sample_rate),
    ))
}
