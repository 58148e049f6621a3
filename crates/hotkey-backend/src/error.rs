//! Error types and result alias for the hotkey-backend crate.
use std::result::Result as StdResult;

use keycode::Chord;
use thiserror::Error;

/// Convenient result type used throughout this crate.
pub type Result<T> = StdResult<T, Error>;

/// Error variants produced by registration backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The chord is already claimed, by another process or another registration.
    #[error("Hotkey {chord} is already registered")]
    Conflict {
        /// The refused chord.
        chord: Chord,
    },
    /// No active registration exists for the provided handle.
    #[error("Invalid registration handle")]
    InvalidHandle,
    /// Underlying OS provided an error.
    #[error("OS error: {0}")]
    Os(String),
}
