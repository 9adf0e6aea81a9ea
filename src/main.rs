use std::process::ExitCode;
use std::time::Instant;

use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;

use epub2mp3::encoder::Mp3Encoder;
use epub2mp3::synth::CommandSynthesizer;
use epub2mp3::tagger::{FfmpegTagger, Tagger};
use epub2mp3::text::DocumentExtractor;
use epub2mp3::{cli, pipeline, Backends, Result};

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let matches = cli::command().get_matches();
    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(matches: &clap::ArgMatches) -> Result<()> {
    let (config, job) = cli::resolve(matches)?;
    let start_time = Instant::now();

    let prepared = pipeline::prepare(&job, &config, &DocumentExtractor)?;
    if prepared.is_empty() {
        return Ok(());
    }

    // Tools are only looked up once there is something to speak.
    let synthesizer = CommandSynthesizer::detect(&config)?;
    println!("🗣️  Using TTS engine: {}", synthesizer.engine().program());
    let encoder = Mp3Encoder::detect(&config)?;
    let tagger = FfmpegTagger::detect(config.part_timeout());
    if tagger.is_none() {
        warn!("ffmpeg not found, parts will not be tagged");
        println!("⚠️  ffmpeg not found: parts will not be tagged");
    }
    let backends = Backends {
        synthesizer: &synthesizer,
        encoder: &encoder,
        tagger: tagger.as_ref().map(|t| t as &dyn Tagger),
    };

    let progress_bar = ProgressBar::new(prepared.plans.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );

    let summary = pipeline::synthesize(&job, &prepared, &backends, &progress_bar)?;

    println!(
        "✅ Conversion completed in {:.2?}: {}/{} part(s) written",
        start_time.elapsed(),
        summary.produced.len(),
        summary.attempted()
    );
    for path in &summary.produced {
        println!("📁 {}", path.display());
    }
    if !summary.failures.is_empty() {
        println!("⚠️  {} part(s) failed:", summary.failures.len());
        for failure in &summary.failures {
            println!("   {}", failure);
        }
    }

    Ok(())
}
