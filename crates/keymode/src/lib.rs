//! Chord resolution: the graph of configured key sequences and the
//! automaton that walks it.
//!
//! [`ChordGraph`] is built once per configuration from
//! [`config::AppRegistry`]. [`State`] consumes one key at a time and never
//! reads the clock itself; callers pass `now` and schedule expiries.

mod error;
mod graph;
mod state;

pub use error::{GraphError, Path};
pub use graph::{ChordGraph, Edge, Edges, GraphBuilder, Node, NodeId};
pub use state::{Expiry, FireKind, Fired, KeyResponse, Mode, Outcome, Pending, State};
