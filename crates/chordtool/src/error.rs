//! Error handling for the chordtool crate.

use std::{io, result};

use thiserror::Error;

/// Convenient result type for chordtool operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors that can occur while running chordtool.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrapper for standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Settings or mapping could not be loaded.
    #[error("{}", .0.pretty())]
    Config(#[from] config::Error),
    /// A key descriptor on the command line was malformed.
    #[error("{0}")]
    Key(#[from] keycode::ParseError),
    /// A replay step could not be parsed.
    #[error("Invalid step {step:?}: {reason}")]
    Step {
        /// Step text as given.
        step: String,
        /// What was wrong with it.
        reason: String,
    },
    /// The mapping loaded, but some entries were rejected.
    #[error("{count} mapping entries rejected")]
    Rejected {
        /// Number of rejected entries.
        count: usize,
    },
}
