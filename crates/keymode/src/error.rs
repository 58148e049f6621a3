use std::fmt;

use keycode::Chord;
use thiserror::Error;

/// A key path, rendered as `ctrl+x, ctrl+s`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path(pub Vec<Chord>);

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(Chord::to_string_canonical).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Errors raised while building a chord graph.
///
/// Each rejects one binding or link; the rest of the graph is kept.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A binding with no keys.
    #[error("binding has no keys")]
    EmptySequence,
    /// The entry would make a chord path loop back on itself.
    #[error("cyclic chord definition at [{path}]")]
    CyclicChordDefinition {
        /// Path of the rejected edge.
        path: Path,
    },
    /// A link refers to a path that no binding created.
    #[error("unknown chord path [{path}]")]
    UnknownPath {
        /// The missing path.
        path: Path,
    },
    /// A link would replace an existing transition with a different target.
    #[error("chord path [{path}] already leads elsewhere")]
    DuplicateEdge {
        /// Path of the existing edge.
        path: Path,
    },
}
