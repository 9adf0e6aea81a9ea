//! End-to-end conversion runs with in-process backends.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;

use epub2mp3::encoder::Encoder;
use epub2mp3::pipeline::{convert, prepare, synthesize, Backends, Job};
use epub2mp3::synth::Synthesizer;
use epub2mp3::tagger::Tagger;
use epub2mp3::text::DocumentExtractor;
use epub2mp3::{Config, ConvertError, Metadata, Result, TagOverrides};

/// Writes a short valid waveform and remembers how many words it was asked to speak.
#[derive(Default)]
struct FakeSynth {
    word_counts: RefCell<Vec<usize>>,
    fail_on_call: Option<usize>,
}

impl Synthesizer for FakeSynth {
    fn synthesize(&self, text: &str, wav_path: &Path) -> Result<()> {
        let call = self.word_counts.borrow().len() + 1;
        self.word_counts.borrow_mut().push(text.split(' ').count());
        if self.fail_on_call == Some(call) {
            return Err(ConvertError::Synthesis("engine crashed".into()));
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer =
            hound::WavWriter::create(wav_path, spec).map_err(|e| ConvertError::Synthesis(e.to_string()))?;
        for _ in 0..80 {
            writer
                .write_sample(0i16)
                .map_err(|e| ConvertError::Synthesis(e.to_string()))?;
        }
        writer.finalize().map_err(|e| ConvertError::Synthesis(e.to_string()))
    }
}

struct CopyEncoder;

impl Encoder for CopyEncoder {
    fn encode(&self, wav_path: &Path, output_path: &Path) -> Result<()> {
        fs::copy(wav_path, output_path)?;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingTagger {
    tagged: RefCell<Vec<(PathBuf, Metadata)>>,
    fail: bool,
}

impl Tagger for RecordingTagger {
    fn tag(&self, path: &Path, metadata: &Metadata) -> Result<()> {
        if self.fail {
            return Err(ConvertError::Tag("ffmpeg exited with 1".into()));
        }
        self.tagged.borrow_mut().push((path.to_path_buf(), metadata.clone()));
        Ok(())
    }
}

fn write_book(dir: &Path, words: usize) -> PathBuf {
    let path = dir.join("book.txt");
    let text: Vec<String> = (0..words).map(|i| format!("w{}", i)).collect();
    fs::write(&path, text.join(" ")).unwrap();
    path
}

fn job(document: PathBuf, output: PathBuf, words_per_part: Option<usize>) -> Job {
    Job {
        document,
        output,
        words_per_part,
        offset: 0,
        end: None,
        tags: TagOverrides::default(),
    }
}

fn leftover_waveforms(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .path()
                .extension()
                .map_or(false, |ext| ext == "wav")
        })
        .count()
}

#[test]
fn ten_thousand_words_in_two_parts() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_book(dir.path(), 10_000);
    let out_dir = dir.path().join("out");
    let synth = FakeSynth::default();
    let tagger = RecordingTagger::default();
    let backends = Backends {
        synthesizer: &synth,
        encoder: &CopyEncoder,
        tagger: Some(&tagger),
    };

    let summary = convert(
        &job(document, out_dir.join("book"), Some(4500)),
        &Config::default(),
        &DocumentExtractor,
        &backends,
        &ProgressBar::hidden(),
    )
    .unwrap();

    assert!(summary.failures.is_empty());
    assert_eq!(
        summary.produced,
        vec![out_dir.join("book_part_1.mp3"), out_dir.join("book_part_2.mp3")]
    );
    assert_eq!(*synth.word_counts.borrow(), vec![4500, 5500]);

    let tagged = tagger.tagged.borrow();
    assert_eq!(tagged.len(), 2);
    for (_, metadata) in tagged.iter() {
        assert_eq!(metadata.album, "book");
        assert_eq!(metadata.artist, "epub2mp3");
    }
    assert_eq!(tagged[1].1.title, "book_part_2");
    assert_eq!(leftover_waveforms(&out_dir), 0);
}

#[test]
fn short_book_is_one_unsuffixed_file() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_book(dir.path(), 3000);
    let synth = FakeSynth::default();
    let backends = Backends {
        synthesizer: &synth,
        encoder: &CopyEncoder,
        tagger: None,
    };

    let summary = convert(
        &job(document, dir.path().join("book.mp3"), None),
        &Config::default(),
        &DocumentExtractor,
        &backends,
        &ProgressBar::hidden(),
    )
    .unwrap();

    assert_eq!(summary.produced, vec![dir.path().join("book.mp3")]);
    assert_eq!(*synth.word_counts.borrow(), vec![3000]);
}

#[test]
fn failing_part_does_not_stop_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_book(dir.path(), 30);
    let synth = FakeSynth {
        fail_on_call: Some(2),
        ..Default::default()
    };
    let backends = Backends {
        synthesizer: &synth,
        encoder: &CopyEncoder,
        tagger: None,
    };

    let summary = convert(
        &job(document, dir.path().join("book.mp3"), Some(10)),
        &Config::default(),
        &DocumentExtractor,
        &backends,
        &ProgressBar::hidden(),
    )
    .unwrap();

    assert_eq!(summary.attempted(), 3);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].index, 2);
    assert!(matches!(summary.failures[0].error, ConvertError::Synthesis(_)));
    assert_eq!(
        summary.produced,
        vec![dir.path().join("book_part_1.mp3"), dir.path().join("book_part_3.mp3")]
    );
    assert!(!dir.path().join("book_part_2.mp3").exists());
    assert_eq!(leftover_waveforms(dir.path()), 0);
}

#[test]
fn tagging_failure_keeps_the_audio() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_book(dir.path(), 12);
    let synth = FakeSynth::default();
    let tagger = RecordingTagger {
        fail: true,
        ..Default::default()
    };
    let backends = Backends {
        synthesizer: &synth,
        encoder: &CopyEncoder,
        tagger: Some(&tagger),
    };

    let summary = convert(
        &job(document, dir.path().join("book.mp3"), None),
        &Config::default(),
        &DocumentExtractor,
        &backends,
        &ProgressBar::hidden(),
    )
    .unwrap();

    assert!(summary.failures.is_empty());
    assert!(dir.path().join("book.mp3").exists());
}

#[test]
fn range_narrows_what_is_spoken() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_book(dir.path(), 100);
    let synth = FakeSynth::default();
    let backends = Backends {
        synthesizer: &synth,
        encoder: &CopyEncoder,
        tagger: None,
    };
    let mut request = job(document, dir.path().join("book.mp3"), Some(20));
    request.offset = 10;
    request.end = Some(1000);

    let summary = convert(
        &request,
        &Config::default(),
        &DocumentExtractor,
        &backends,
        &ProgressBar::hidden(),
    )
    .unwrap();

    assert_eq!(summary.produced.len(), 4);
    assert_eq!(*synth.word_counts.borrow(), vec![20, 20, 20, 30]);
}

#[test]
fn offset_past_the_end_produces_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_book(dir.path(), 50);
    let synth = FakeSynth::default();
    let backends = Backends {
        synthesizer: &synth,
        encoder: &CopyEncoder,
        tagger: None,
    };
    let mut request = job(document, dir.path().join("book.mp3"), Some(20));
    request.offset = 500;

    let summary = convert(
        &request,
        &Config::default(),
        &DocumentExtractor,
        &backends,
        &ProgressBar::hidden(),
    )
    .unwrap();

    assert_eq!(summary.attempted(), 0);
    assert!(synth.word_counts.borrow().is_empty());
}

#[test]
fn planning_happens_before_backends_exist() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_book(dir.path(), 40);
    let out_dir = dir.path().join("nested").join("out");
    let request = job(document, out_dir.join("book.mp3"), Some(20));

    let prepared = prepare(&request, &Config::default(), &DocumentExtractor).unwrap();
    assert_eq!(prepared.plans.len(), 2);
    assert_eq!(prepared.total_words(), 40);
    assert!(!out_dir.exists());

    let synth = FakeSynth::default();
    let backends = Backends {
        synthesizer: &synth,
        encoder: &CopyEncoder,
        tagger: None,
    };
    let summary = synthesize(&request, &prepared, &backends, &ProgressBar::hidden()).unwrap();

    assert_eq!(
        summary.produced,
        vec![out_dir.join("book_part_1.mp3"), out_dir.join("book_part_2.mp3")]
    );
    assert_eq!(*synth.word_counts.borrow(), vec![20, 20]);
}

#[test]
fn empty_selection_creates_no_output_directory() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_book(dir.path(), 10);
    let out_dir = dir.path().join("out");
    let mut request = job(document, out_dir.join("book.mp3"), None);
    request.offset = 10;

    let prepared = prepare(&request, &Config::default(), &DocumentExtractor).unwrap();
    assert!(prepared.is_empty());

    let synth = FakeSynth::default();
    let backends = Backends {
        synthesizer: &synth,
        encoder: &CopyEncoder,
        tagger: None,
    };
    let summary = synthesize(&request, &prepared, &backends, &ProgressBar::hidden()).unwrap();

    assert_eq!(summary.attempted(), 0);
    assert!(!out_dir.exists());
}

#[test]
fn zero_words_per_part_is_rejected_before_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let synth = FakeSynth::default();
    let backends = Backends {
        synthesizer: &synth,
        encoder: &CopyEncoder,
        tagger: None,
    };

    let err = convert(
        &job(dir.path().join("missing.epub"), dir.path().join("book.mp3"), Some(0)),
        &Config::default(),
        &DocumentExtractor,
        &backends,
        &ProgressBar::hidden(),
    )
    .unwrap_err();

    assert!(matches!(err, ConvertError::Config(_)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
