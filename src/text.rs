//! Text extraction from EPUB and plain-text documents.

use std::fs;
use std::path::Path;

use epub::doc::EpubDoc;
use html2text::from_read;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConvertError, Result};

/// Rendering width handed to html2text. Line breaks are irrelevant downstream.
const RENDER_WIDTH: usize = 100;

static CLEANUP_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        // Link reference definitions appended by html2text
        (r"(?m)^\s*\[\d+\]:.*$", ""),
        // Footnote and link reference markers
        (r"\[\d+\]", ""),
        // Bracketed link text
        (r"\[([^\]\n]+)\]", "$1"),
        // HTML entities html2text left behind
        (r"&[a-zA-Z0-9#]+;", " "),
        // Heading, bullet and quote markers at line start
        (r"(?m)^\s*(?:#+|[*>]|-)\s+", ""),
        // Horizontal rules
        (r"(?m)^[\s─━=_*\-]+$", ""),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("cleanup pattern is a valid regex"),
            replacement,
        )
    })
    .collect()
});

/// Something that turns a document path into its plain text in reading order.
pub trait TextExtractor {
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Reads `.txt` files verbatim and everything else as EPUB.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let is_plain = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);

        if is_plain {
            fs::read_to_string(path).map_err(|e| ConvertError::Extraction {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        } else {
            extract_epub(path)
        }
    }
}

fn extract_epub(path: &Path) -> Result<String> {
    let mut doc = EpubDoc::new(path).map_err(|e| ConvertError::Extraction {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut sections = Vec::new();
    loop {
        if let Some((html, _mime)) = doc.get_current_str() {
            let plain = from_read(html.as_bytes(), RENDER_WIDTH);
            let cleaned = clean_text(&plain);
            if !cleaned.trim().is_empty() {
                debug!("spine item {}: {} bytes of text", sections.len(), cleaned.len());
                sections.push(cleaned);
            }
        }
        if !doc.go_next() {
            break;
        }
    }

    info!("extracted {} sections from {}", sections.len(), path.display());
    Ok(sections.join("\n\n"))
}

/// Strips the markup html2text renders so it is not read aloud.
pub fn clean_text(text: &str) -> String {
    let mut cleaned = text.to_string();
    for (regex, replacement) in CLEANUP_PATTERNS.iter() {
        cleaned = regex.replace_all(&cleaned, *replacement).into_owned();
    }
    cleaned.trim().to_string()
}
