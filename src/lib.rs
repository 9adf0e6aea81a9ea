//! Converts e-books into spoken MP3 audiobook parts.
//!
//! Text is extracted, split into words, optionally narrowed to a word range,
//! and planned into parts of a bounded word count. Each part is synthesized,
//! encoded and tagged on its own, so one failing part does not stop the rest.
//! [`session`] runs whole conversions as isolated child processes for the
//! job launcher.

pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod process;
pub mod session;
pub mod synth;
pub mod tagger;
pub mod text;
pub mod words;

pub use config::Config;
pub use error::{ConvertError, PartFailure, Result, SessionError};
pub use pipeline::{Backends, Job, RunSummary};
pub use plan::{Metadata, PartPlan, TagOverrides};
pub use words::{Selection, WordSequence};
