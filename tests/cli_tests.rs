//! Exit codes and early outcomes of the converter binary.
//! None of these reach the TTS engine, so no external tools are needed.

use std::fs;
use std::process::Command;

fn converter() -> Command {
    Command::new(env!("CARGO_BIN_EXE_epub2mp3"))
}

#[test]
fn zero_parts_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("book.txt");
    fs::write(&document, "some words to read").unwrap();

    let output = converter()
        .arg(&document)
        .arg(dir.path().join("book.mp3"))
        .args(["--parts", "0"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--parts"), "stderr: {}", stderr);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn end_before_offset_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("book.txt");
    fs::write(&document, "some words to read").unwrap();

    let status = converter()
        .arg(&document)
        .arg(dir.path().join("book.mp3"))
        .args(["--offset", "5", "--end", "2"])
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(1));
}

#[test]
fn unreadable_document_fails() {
    let dir = tempfile::tempdir().unwrap();

    let output = converter()
        .arg(dir.path().join("missing.epub"))
        .arg(dir.path().join("book.mp3"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Could not extract text"));
}

#[test]
fn empty_selection_is_reported_not_failed() {
    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("book.txt");
    fs::write(&document, "only four words here").unwrap();

    let output = converter()
        .arg(&document)
        .arg(dir.path().join("book.mp3"))
        .args(["--offset", "10", "--parts"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Nothing to synthesize"), "stdout: {}", stdout);
    assert!(stdout.contains("Total words: 4"));
    assert!(!dir.path().join("book.mp3").exists());
}
