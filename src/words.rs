//! Word stream and range selection.

use std::ops::Range;

/// Ordered, immutable whitespace-delimited tokens of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordSequence {
    words: Vec<String>,
}

impl WordSequence {
    /// Splits on runs of whitespace. Empty input yields an empty sequence.
    pub fn build(text: &str) -> Self {
        Self {
            words: text.split_whitespace().map(str::to_owned).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Applies `start`/`end` with saturating bounds.
    pub fn select(&self, start: usize, end: Option<usize>) -> Selection {
        Selection::clamp(self.len(), start, end)
    }

    /// Words of `range`, which must lie inside the sequence.
    pub fn slice(&self, range: Range<usize>) -> &[String] {
        &self.words[range]
    }
}

/// The effective `[start, end)` window after clamping to a sequence length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    /// `end` past `len` is clamped to `len`; `start` at or past `len` (or past
    /// `end`) gives an empty window instead of an error.
    pub fn clamp(len: usize, start: usize, end: Option<usize>) -> Self {
        let end = end.unwrap_or(len).min(len);
        let start = start.min(end);
        Self { start, end }
    }

    pub fn word_count(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.word_count() == 0
    }
}
