//! Extraction → selection → planning → per-part synthesis, encoding and tagging.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::ProgressBar;
use log::{info, warn};

use crate::config::Config;
use crate::encoder::Encoder;
use crate::error::{ConvertError, PartFailure, Result};
use crate::plan::{plan_parts, Metadata, OutputName, PartPlan, TagOverrides};
use crate::synth::{probe_waveform, Synthesizer};
use crate::tagger::Tagger;
use crate::text::TextExtractor;
use crate::words::{Selection, WordSequence};

/// External capabilities a part runs through.
pub struct Backends<'a> {
    pub synthesizer: &'a dyn Synthesizer,
    pub encoder: &'a dyn Encoder,
    /// Tagging is skipped when absent.
    pub tagger: Option<&'a dyn Tagger>,
}

/// One conversion request, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub document: PathBuf,
    pub output: PathBuf,
    /// `None` converts the selection as a single part.
    pub words_per_part: Option<usize>,
    pub offset: usize,
    pub end: Option<usize>,
    pub tags: TagOverrides,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartOutcome {
    pub duration: Duration,
    pub tagged: bool,
}

/// Result of a run whose setup succeeded. Individual parts may still have failed.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub produced: Vec<PathBuf>,
    pub failures: Vec<PartFailure>,
}

impl RunSummary {
    pub fn attempted(&self) -> usize {
        self.produced.len() + self.failures.len()
    }
}

/// The waveform a part is synthesized into. Deleted when dropped.
struct Intermediate {
    path: PathBuf,
}

impl Intermediate {
    fn for_output(output_path: &Path) -> Self {
        Self {
            path: output_path.with_extension("tts.wav"),
        }
    }
}

impl Drop for Intermediate {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Synthesizes, encodes and tags one part.
///
/// The intermediate waveform never outlives this call. A tagging failure is
/// reported but leaves the encoded file in place.
pub fn run_part(
    words: &[String],
    output_path: &Path,
    metadata: &Metadata,
    backends: &Backends<'_>,
) -> Result<PartOutcome> {
    let text = words.join(" ");

    let duration = {
        let wav = Intermediate::for_output(output_path);
        println!("🎤 Synthesizing speech...");
        backends.synthesizer.synthesize(&text, &wav.path)?;
        let duration = probe_waveform(&wav.path)?;
        println!("🔊 Synthesized {:.1?} of audio", duration);

        println!("💿 Encoding {}", output_path.display());
        if let Err(e) = backends.encoder.encode(&wav.path, output_path) {
            // A partial file must not be mistaken for a finished part.
            let _ = fs::remove_file(output_path);
            return Err(e);
        }
        duration
    };

    let tagged = match backends.tagger {
        Some(tagger) => {
            println!("🏷️  Tagging \"{}\"", metadata.title);
            match tagger.tag(output_path, metadata) {
                Ok(()) => true,
                Err(e) => {
                    warn!("tagging {} failed: {}", output_path.display(), e);
                    println!("⚠️  Tagging failed, keeping untagged audio: {}", e);
                    false
                }
            }
        }
        None => false,
    };

    Ok(PartOutcome { duration, tagged })
}

/// Runs every planned part in order. A failing part is recorded and the
/// next one is attempted.
pub fn run_parts(
    selection: &[String],
    plans: &[PartPlan],
    backends: &Backends<'_>,
    progress: &ProgressBar,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for plan in plans {
        println!(
            "🎧 Part {}/{}: {} ({} words)",
            plan.index,
            plan.total,
            plan.output_path.display(),
            plan.word_count()
        );
        progress.set_message(format!("part {}", plan.index));

        let words = &selection[plan.words.clone()];
        match run_part(words, &plan.output_path, &plan.metadata, backends) {
            Ok(outcome) => {
                info!(
                    "part {} done: {:?}, tagged: {}",
                    plan.index, outcome.duration, outcome.tagged
                );
                println!("✅ Part {}/{} complete", plan.index, plan.total);
                summary.produced.push(plan.output_path.clone());
            }
            Err(error) => {
                warn!("part {} failed: {}", plan.index, error);
                println!("❌ Part {}/{} failed: {}", plan.index, plan.total, error);
                summary.failures.push(PartFailure {
                    index: plan.index,
                    path: plan.output_path.clone(),
                    error,
                });
            }
        }
        progress.inc(1);
    }

    progress.finish_and_clear();
    summary
}

/// A document split into planned parts, ready to be synthesized.
#[derive(Debug)]
pub struct Prepared {
    sequence: WordSequence,
    selection: Selection,
    pub plans: Vec<PartPlan>,
}

impl Prepared {
    /// Words of the selected range; plan ranges index into this slice.
    pub fn words(&self) -> &[String] {
        self.sequence.slice(self.selection.start..self.selection.end)
    }

    pub fn total_words(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

/// Validates the job, extracts the document and plans its parts.
///
/// Configuration and extraction problems are the only errors; an empty
/// selection yields an empty plan.
pub fn prepare(job: &Job, config: &Config, extractor: &dyn TextExtractor) -> Result<Prepared> {
    if let Some(end) = job.end {
        if end <= job.offset {
            return Err(ConvertError::Config(format!(
                "end ({}) must be greater than offset ({})",
                end, job.offset
            )));
        }
    }
    if job.words_per_part == Some(0) {
        return Err(ConvertError::Config(
            "words per part must be a positive integer".into(),
        ));
    }

    println!("📖 Converting {} to text", job.document.display());
    let text = extractor.extract(&job.document)?;
    let sequence = WordSequence::build(&text);
    if sequence.is_empty() {
        warn!("{} contains no words", job.document.display());
    }
    let selection = sequence.select(job.offset, job.end);
    println!(
        "📊 Total words: {}, selected words {}..{} ({})",
        sequence.len(),
        selection.start,
        selection.end,
        selection.word_count()
    );

    let name = OutputName::new(&job.output, &config.extension);
    let plans = plan_parts(
        selection.word_count(),
        job.words_per_part,
        &name,
        &job.tags,
        &config.default_artist,
    )?;
    if plans.is_empty() {
        println!("ℹ️  Nothing to synthesize: the selected range contains no words");
    } else {
        println!("✂️  Splitting into {} part(s)", plans.len());
    }

    Ok(Prepared {
        sequence,
        selection,
        plans,
    })
}

/// Creates the directory an output path lives in.
pub fn ensure_output_dir(output: &Path) -> Result<()> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}

/// Synthesizes every planned part of a prepared job.
pub fn synthesize(
    job: &Job,
    prepared: &Prepared,
    backends: &Backends<'_>,
    progress: &ProgressBar,
) -> Result<RunSummary> {
    if prepared.is_empty() {
        return Ok(RunSummary::default());
    }
    ensure_output_dir(&job.output)?;
    progress.set_length(prepared.plans.len() as u64);
    Ok(run_parts(prepared.words(), &prepared.plans, backends, progress))
}

/// Full conversion of one document with the given backends.
///
/// Per-part failures are collected in the summary rather than returned.
pub fn convert(
    job: &Job,
    config: &Config,
    extractor: &dyn TextExtractor,
    backends: &Backends<'_>,
    progress: &ProgressBar,
) -> Result<RunSummary> {
    let prepared = prepare(job, config, extractor)?;
    synthesize(job, &prepared, backends, progress)
}
