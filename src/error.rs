//! Error types for the converter.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while turning a document into audiobook parts.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Invalid user or file configuration, detected before any work starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The document could not be read or parsed.
    #[error("Could not extract text from {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Tagging failed: {0}")]
    Tag(String),

    /// None of the candidate external programs is installed.
    #[error("No {kind} found. Please install {hint}")]
    ToolNotFound { kind: &'static str, hint: &'static str },

    #[error("{program} did not finish within {limit:?}")]
    Timeout { program: String, limit: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Configuration and extraction failures abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConvertError::Config(_) | ConvertError::Extraction { .. })
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// A part that could not be produced. The run continues past it.
#[derive(Debug)]
pub struct PartFailure {
    /// 1-based part ordinal.
    pub index: usize,
    pub path: PathBuf,
    pub error: ConvertError,
}

impl std::fmt::Display for PartFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "part {} ({}): {}", self.index, self.path.display(), self.error)
    }
}

/// Errors owned by a web/launcher session rather than by the conversion.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Could not create working directory under {root}: {source}")]
    WorkDir {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not start converter {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session I/O error: {0}")]
    Io(#[from] std::io::Error),
}
