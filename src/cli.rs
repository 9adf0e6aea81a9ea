//! Command-line surface of the converter.

use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{Arg, ArgMatches, Command};

use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::pipeline::Job;
use crate::plan::TagOverrides;

pub fn command() -> Command {
    Command::new("epub2mp3")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Converts an EPUB book into tagged MP3 audiobook parts")
        .arg(
            Arg::new("document")
                .value_name("DOCUMENT")
                .help("Input EPUB (or .txt) file")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("output")
                .value_name("OUTPUT")
                .help("Output MP3 path; parts get a _part_N suffix")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("parts")
                .long("parts")
                .value_name("WORDS")
                .help("Split into parts of this many words (bare flag: 4500, about 30 minutes)")
                .num_args(0..=1)
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("artist")
                .long("artist")
                .value_name("NAME")
                .help("Artist tag (default: epub2mp3)"),
        )
        .arg(
            Arg::new("album")
                .long("album")
                .value_name("TITLE")
                .help("Album tag (default: output file name)"),
        )
        .arg(
            Arg::new("track")
                .long("track")
                .value_name("TITLE")
                .help("Track title tag (default: part file name)"),
        )
        .arg(
            Arg::new("offset")
                .long("offset")
                .value_name("WORD")
                .help("Index of the first word to convert")
                .value_parser(clap::value_parser!(usize))
                .default_value("0"),
        )
        .arg(
            Arg::new("end")
                .long("end")
                .value_name("WORD")
                .help("Index one past the last word to convert")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("JSON configuration file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECS")
                .help("Give up on a part's synthesis or encoding after this many seconds")
                .value_parser(clap::value_parser!(u64)),
        )
}

/// Turns parsed arguments into a validated configuration and job.
pub fn resolve(matches: &ArgMatches) -> Result<(Config, Job)> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        config.part_timeout_secs = Some(*secs);
    }
    config.validate()?;

    // A bare `--parts` is present on the command line but carries no value.
    let words_per_part = match matches.get_one::<i64>("parts") {
        Some(&n) if n <= 0 => {
            return Err(ConvertError::Config(format!(
                "--parts must be a positive number of words, got {}",
                n
            )))
        }
        Some(&n) => Some(n as usize),
        None if matches.value_source("parts") == Some(ValueSource::CommandLine) => {
            Some(config.words_per_part)
        }
        None => None,
    };

    let offset = matches.get_one::<usize>("offset").copied().unwrap_or(0);
    let end = matches.get_one::<usize>("end").copied();
    if let Some(end) = end {
        if end <= offset {
            return Err(ConvertError::Config(format!(
                "--end ({}) must be greater than --offset ({})",
                end, offset
            )));
        }
    }

    let text = |id: &str| matches.get_one::<String>(id).cloned();
    let job = Job {
        document: required_path(matches, "document")?,
        output: required_path(matches, "output")?,
        words_per_part,
        offset,
        end,
        tags: TagOverrides {
            artist: text("artist"),
            album: text("album"),
            track: text("track"),
        },
    };
    Ok((config, job))
}

fn required_path(matches: &ArgMatches, id: &str) -> Result<PathBuf> {
    matches
        .get_one::<PathBuf>(id)
        .cloned()
        .ok_or_else(|| ConvertError::Config(format!("missing <{}>", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<(Config, Job)> {
        let matches = command()
            .try_get_matches_from(std::iter::once("epub2mp3").chain(args.iter().copied()))
            .expect("arguments parse");
        resolve(&matches)
    }

    #[test]
    fn no_parts_flag_means_single_part() {
        let (_, job) = parse(&["book.epub", "book.mp3"]).unwrap();
        assert_eq!(job.words_per_part, None);
        assert_eq!(job.offset, 0);
        assert_eq!(job.end, None);
        assert_eq!(job.tags, TagOverrides::default());
    }

    #[test]
    fn bare_parts_flag_uses_default_size() {
        let (_, job) = parse(&["book.epub", "book.mp3", "--parts"]).unwrap();
        assert_eq!(job.words_per_part, Some(4500));
    }

    #[test]
    fn bare_parts_flag_follows_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{"words_per_part": 1000}"#).unwrap();
        let config_path = file.path().to_string_lossy().into_owned();

        let (_, job) = parse(&["book.epub", "book.mp3", "--config", &config_path, "--parts"]).unwrap();
        assert_eq!(job.words_per_part, Some(1000));
    }

    #[test]
    fn explicit_parts_value() {
        let (_, job) = parse(&["book.epub", "book.mp3", "--parts", "1200"]).unwrap();
        assert_eq!(job.words_per_part, Some(1200));
    }

    #[test]
    fn non_positive_parts_is_a_config_error() {
        for value in ["0", "-5"] {
            let err = parse(&["book.epub", "book.mp3", "--parts", value]).unwrap_err();
            assert!(matches!(err, ConvertError::Config(_)), "value {}", value);
        }
    }

    #[test]
    fn end_must_follow_offset() {
        let err = parse(&["b.epub", "b.mp3", "--offset", "100", "--end", "100"]).unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));

        let (_, job) = parse(&["b.epub", "b.mp3", "--offset", "100", "--end", "101"]).unwrap();
        assert_eq!((job.offset, job.end), (100, Some(101)));
    }

    #[test]
    fn tags_and_timeout_are_collected() {
        let (config, job) = parse(&[
            "b.epub", "b.mp3", "--artist", "Jane Doe", "--album", "Alpha", "--track", "Ch 1",
            "--timeout", "600",
        ])
        .unwrap();
        assert_eq!(job.tags.artist.as_deref(), Some("Jane Doe"));
        assert_eq!(job.tags.album.as_deref(), Some("Alpha"));
        assert_eq!(job.tags.track.as_deref(), Some("Ch 1"));
        assert_eq!(config.part_timeout_secs, Some(600));
    }
}
