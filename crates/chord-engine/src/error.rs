use std::result::Result as StdResult;

use keycode::Chord;
use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the chord engine.
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// Errors originating from the registration backend.
    #[error("Hotkey backend error: {0}")]
    Backend(#[from] hotkey_backend::Error),

    /// A configuration entry was rejected while loading.
    #[error("Config error: {0}")]
    Config(#[from] config::Error),

    /// A chord path was rejected while building the chord graph.
    #[error("Chord graph error: {0}")]
    Graph(#[from] keymode::GraphError),

    /// The backend refused a binding already claimed elsewhere.
    #[error("Registration conflict for {chord}")]
    RegistrationConflict {
        /// The refused chord.
        chord: Chord,
    },

    /// An event subscriber has gone away.
    #[error("Event channel closed")]
    ChannelClosed,
}
